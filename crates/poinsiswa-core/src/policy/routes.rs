//! Role-gated navigation.
//!
//! Each screen of the application is a `Route` with a fixed set of roles
//! allowed to open it. Front-ends ask `guard` before showing a screen and
//! `nav_links` for the menu of the signed-in role.

use crate::models::{Profile, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    AddRecord,
    MyStudents,
    MyPoints,
    ManageUsers,
    ManageClasses,
    ManageAcademicYears,
    Profile,
}

const ALL_ROLES: &[Role] = &[Role::Admin, Role::Teacher, Role::Student];

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::AddRecord => "/add-record",
            Route::MyStudents => "/my-students",
            Route::MyPoints => "/my-points",
            Route::ManageUsers => "/manage-users",
            Route::ManageClasses => "/manage-classes",
            Route::ManageAcademicYears => "/manage-academic-years",
            Route::Profile => "/profile",
        }
    }

    /// Menu label.
    pub fn label(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Dashboard => "Dashboard",
            Route::AddRecord => "Tambah Catatan",
            Route::MyStudents => "Siswa Saya",
            Route::MyPoints => "Poin Saya",
            Route::ManageUsers => "Manajemen User",
            Route::ManageClasses => "Manajemen Kelas",
            Route::ManageAcademicYears => "Tahun Ajaran",
            Route::Profile => "Profil Saya",
        }
    }

    /// Roles allowed to open this route. Empty for the public login page.
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Route::Login => &[],
            Route::Dashboard | Route::Profile => ALL_ROLES,
            Route::AddRecord | Route::MyStudents => &[Role::Teacher],
            Route::MyPoints => &[Role::Student],
            Route::ManageUsers | Route::ManageClasses | Route::ManageAcademicYears => &[Role::Admin],
        }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Render,
    RedirectToLogin,
    RedirectToDashboard,
}

/// Decide what to show for `route` given the signed-in profile, if any.
pub fn guard(profile: Option<&Profile>, route: Route) -> RouteDecision {
    match (profile, route) {
        (None, Route::Login) => RouteDecision::Render,
        (Some(_), Route::Login) => RouteDecision::RedirectToDashboard,
        (None, _) => RouteDecision::RedirectToLogin,
        (Some(p), route) if route.allows(p.role) => RouteDecision::Render,
        (Some(_), _) => RouteDecision::RedirectToDashboard,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavLink {
    pub route: Route,
    pub label: &'static str,
}

/// Sidebar links for a role, with the common profile link last.
pub fn nav_links(role: Role) -> Vec<NavLink> {
    let routes: &[Route] = match role {
        Role::Admin => &[
            Route::Dashboard,
            Route::ManageUsers,
            Route::ManageClasses,
            Route::ManageAcademicYears,
        ],
        Role::Teacher => &[Route::Dashboard, Route::MyStudents, Route::AddRecord],
        Role::Student => &[Route::Dashboard, Route::MyPoints],
    };
    routes
        .iter()
        .chain(std::iter::once(&Route::Profile))
        .map(|&route| NavLink {
            route,
            label: route.label(),
        })
        .collect()
}
