//! End-to-end properties of the point ledger over the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, FixedOffset, TimeZone, Utc};
use futures::future::join_all;

use poinsiswa_core::advice::{AdviceGenerator, AdviceService, ADVICE_FAILED_MESSAGE};
use poinsiswa_core::models::{
    month_start, Classroom, PointEvent, PointEventDraft, PointKind, PointTotals, Profile, Role, Student,
};
use poinsiswa_core::policy::DenyReason;
use poinsiswa_core::store::{LedgerStore, MemoryStore};
use poinsiswa_core::{AuthFailure, LedgerError, LedgerResult, PointLedger};

struct School {
    store: MemoryStore,
    ledger: Arc<PointLedger>,
    admin: Profile,
    teacher_a: Profile,
    teacher_b: Profile,
    unassigned: Profile,
    ani: Profile,
    budi: Profile,
}

fn profile(id: &str, role: Role, classroom: Option<&str>) -> Profile {
    Profile {
        id: id.to_string(),
        name: id.to_string(),
        role,
        classroom_id: classroom.map(str::to_string),
        student_identifier: None,
    }
}

fn student(id: &str, name: &str, classroom: &str, linked: &str) -> Student {
    Student {
        id: id.to_string(),
        external_identifier: format!("00{}", id),
        name: name.to_string(),
        classroom_id: classroom.to_string(),
        points_violation_total: 0,
        points_achievement_total: 0,
        linked_profile_id: linked.to_string(),
    }
}

fn school() -> School {
    let store = MemoryStore::new();
    let school = School {
        ledger: Arc::new(PointLedger::new(Arc::new(store.clone()))),
        admin: profile("admin", Role::Admin, None),
        teacher_a: profile("guru-a", Role::Teacher, Some("k-7a")),
        teacher_b: profile("guru-b", Role::Teacher, Some("k-7b")),
        unassigned: profile("guru-c", Role::Teacher, None),
        ani: profile("p-ani", Role::Student, None),
        budi: profile("p-budi", Role::Student, None),
        store,
    };

    for p in [
        &school.admin,
        &school.teacher_a,
        &school.teacher_b,
        &school.unassigned,
        &school.ani,
        &school.budi,
    ] {
        school.store.insert_profile(p.clone());
    }
    school.store.insert_classroom(Classroom {
        id: "k-7a".to_string(),
        name: "VII A".to_string(),
        homeroom_teacher_id: "guru-a".to_string(),
    });
    school.store.insert_classroom(Classroom {
        id: "k-7b".to_string(),
        name: "VII B".to_string(),
        homeroom_teacher_id: "guru-b".to_string(),
    });
    school.store.insert_student(student("s-ani", "Ani", "k-7a", "p-ani"));
    school.store.insert_student(student("s-budi", "Budi", "k-7b", "p-budi"));
    school.store.insert_student(student("s-citra", "Citra", "k-7a", "p-citra"));
    school
}

fn draft(student_id: &str, kind: PointKind, points: i64) -> PointEventDraft {
    PointEventDraft::new(student_id, kind, points, "Terlambat masuk kelas")
}

async fn totals_of(school: &School, student_id: &str) -> PointTotals {
    school.store.get_student(student_id).await.unwrap().unwrap().totals()
}

fn assert_denied(result: LedgerResult<impl std::fmt::Debug>, expected: DenyReason) {
    match result {
        Err(LedgerError::Auth(AuthFailure::Forbidden(reason))) => assert_eq!(reason, expected),
        other => panic!("expected denial {:?}, got {:?}", expected, other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_sum_exactly() {
    let school = school();
    let teacher = school.teacher_a.clone();

    let handles = (0..40i64).map(|i| {
        let ledger = school.ledger.clone();
        let teacher = teacher.clone();
        let kind = if i % 2 == 0 { PointKind::Violation } else { PointKind::Achievement };
        tokio::spawn(async move { ledger.submit_point_event(&teacher, draft("s-ani", kind, i % 7 + 1)).await })
    });
    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let expected_violation: u64 = (0..40i64).filter(|i| i % 2 == 0).map(|i| (i % 7 + 1) as u64).sum();
    let expected_achievement: u64 = (0..40i64).filter(|i| i % 2 == 1).map(|i| (i % 7 + 1) as u64).sum();

    let totals = totals_of(&school, "s-ani").await;
    assert_eq!(totals.violation_total, expected_violation);
    assert_eq!(totals.achievement_total, expected_achievement);

    let events = school.ledger.list_events_for_student(&teacher, "s-ani").await.unwrap();
    assert_eq!(events.len(), 40);
    assert_eq!(PointTotals::from_events(&events), totals);
}

#[tokio::test]
async fn test_non_positive_points_change_nothing() {
    let school = school();
    for points in [0, -5] {
        let err = school
            .ledger
            .submit_point_event(&school.teacher_a, draft("s-ani", PointKind::Violation, points))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
    assert_eq!(school.store.event_count(), 0);
    assert_eq!(totals_of(&school, "s-ani").await, PointTotals::default());
}

#[tokio::test]
async fn test_teacher_cannot_touch_other_classroom() {
    let school = school();
    let result = school
        .ledger
        .submit_point_event(&school.teacher_a, draft("s-budi", PointKind::Violation, 10))
        .await;
    assert_denied(result, DenyReason::NotInClassroom);
    assert_eq!(school.store.event_count(), 0);

    assert_denied(
        school.ledger.list_events_for_student(&school.teacher_a, "s-budi").await,
        DenyReason::NotInClassroom,
    );
    assert_denied(school.ledger.list_students(&school.teacher_a, "k-7b").await, DenyReason::NotInClassroom);
}

#[tokio::test]
async fn test_unassigned_teacher_is_denied() {
    let school = school();
    let result = school
        .ledger
        .submit_point_event(&school.unassigned, draft("s-ani", PointKind::Achievement, 5))
        .await;
    assert_denied(result, DenyReason::NoClassroomAssigned);

    let stats = school.ledger.teacher_dashboard(&school.unassigned).await.unwrap();
    assert_eq!(stats.classroom_name, "");
    assert_eq!(stats.student_count, 0);
}

#[tokio::test]
async fn test_student_reads_only_own_records() {
    let school = school();
    school
        .ledger
        .submit_point_event(&school.teacher_b, draft("s-budi", PointKind::Violation, 10))
        .await
        .unwrap();

    assert_denied(school.ledger.list_events_for_student(&school.ani, "s-budi").await, DenyReason::NotOwner);
    assert_denied(school.ledger.get_aggregates(&school.ani, "s-budi").await, DenyReason::NotOwner);

    let own = school.ledger.list_events_for_student(&school.budi, "s-budi").await.unwrap();
    assert_eq!(own.len(), 1);
    let mine = school.ledger.my_student(&school.budi).await.unwrap();
    assert_eq!(mine.id, "s-budi");
    assert_eq!(mine.totals().violation_total, 10);

    let result = school
        .ledger
        .submit_point_event(&school.ani, draft("s-ani", PointKind::Achievement, 100))
        .await;
    assert_denied(result, DenyReason::Forbidden);
}

#[tokio::test]
async fn test_submitted_event_reads_back_first() {
    let school = school();
    let earlier = school
        .ledger
        .submit_point_event(&school.teacher_a, draft("s-ani", PointKind::Violation, 5))
        .await
        .unwrap();
    let submitted = school
        .ledger
        .submit_point_event(
            &school.teacher_a,
            PointEventDraft::new("s-ani", PointKind::Achievement, 20, "Juara lomba cerdas cermat"),
        )
        .await
        .unwrap();
    assert!(!submitted.replayed);
    assert_eq!(submitted.totals, PointTotals { violation_total: 5, achievement_total: 20 });

    let events = school.ledger.list_events_for_student(&school.teacher_a, "s-ani").await.unwrap();
    assert_eq!(events[0], submitted.event);
    assert_eq!(events[1], earlier.event);
    assert_eq!(events[0].issued_by_teacher_id, "guru-a");
    assert_eq!(events[0].description, "Juara lomba cerdas cermat");

    let split = school.ledger.events_by_kind(&school.ani, "s-ani").await.unwrap();
    assert_eq!(split.violations, vec![earlier.event]);
    assert_eq!(split.achievements, vec![submitted.event]);

    assert_eq!(
        school.ledger.get_aggregates(&school.ani, "s-ani").await.unwrap(),
        submitted.totals
    );
}

struct FailingAdvice;

#[async_trait]
impl AdviceGenerator for FailingAdvice {
    async fn generate(&self, _prompt: &str) -> LedgerResult<String> {
        Err(LedgerError::Service("quota exceeded".to_string()))
    }
}

#[tokio::test]
async fn test_advice_failure_leaves_ledger_intact() {
    let school = school();
    let submitted = school
        .ledger
        .submit_point_event(&school.teacher_a, draft("s-ani", PointKind::Violation, 15))
        .await
        .unwrap();

    let advisor = AdviceService::new(Arc::new(FailingAdvice));
    let advice = school
        .ledger
        .request_advice(&school.teacher_a, &submitted.event.id, &advisor)
        .await
        .unwrap();
    assert!(advice.degraded);
    assert_eq!(advice.text, ADVICE_FAILED_MESSAGE);

    assert_eq!(school.store.event_count(), 1);
    assert_eq!(totals_of(&school, "s-ani").await.violation_total, 15);

    assert_denied(
        school.ledger.request_advice(&school.teacher_b, &submitted.event.id, &advisor).await,
        DenyReason::NotInClassroom,
    );
}

struct CannedAdvice;

#[async_trait]
impl AdviceGenerator for CannedAdvice {
    async fn generate(&self, prompt: &str) -> LedgerResult<String> {
        assert!(prompt.contains("Ani"));
        Ok("Ajak bicara wali murid.".to_string())
    }
}

#[tokio::test]
async fn test_advice_after_submission_survives_storage_outage() {
    let school = school();
    let submitted = school
        .ledger
        .submit_point_event(&school.teacher_a, draft("s-ani", PointKind::Violation, 10))
        .await
        .unwrap();
    assert_eq!(submitted.student.id, "s-ani");

    school.store.set_healthy(false);
    assert!(matches!(
        school
            .ledger
            .request_advice(&school.teacher_a, &submitted.event.id, &AdviceService::new(Arc::new(CannedAdvice)))
            .await,
        Err(LedgerError::Storage(_))
    ));

    let advice = school
        .ledger
        .advice_for_submission(&submitted, &AdviceService::new(Arc::new(CannedAdvice)))
        .await;
    assert!(!advice.degraded);
    assert_eq!(advice.text, "Ajak bicara wali murid.");

    let advice = school
        .ledger
        .advice_for_submission(&submitted, &AdviceService::new(Arc::new(FailingAdvice)))
        .await;
    assert!(advice.degraded);

    school.store.set_healthy(true);
    assert_eq!(school.store.event_count(), 1);
}

#[tokio::test]
async fn test_admin_dashboard_month_follows_school_offset() {
    let school = school();
    let wib = FixedOffset::east_opt(7 * 3600).unwrap();
    let event = |id: &str, created_at: chrono::DateTime<FixedOffset>| PointEvent {
        id: id.to_string(),
        student_id: "s-ani".to_string(),
        issued_by_teacher_id: "guru-a".to_string(),
        description: id.to_string(),
        points: 2,
        kind: PointKind::Violation,
        created_at: created_at.with_timezone(&Utc),
        idempotency_key: None,
    };
    school
        .store
        .insert_legacy_event(event("mid-feb", wib.with_ymd_and_hms(2024, 2, 15, 9, 0, 0).unwrap()));
    school
        .store
        .insert_legacy_event(event("late-feb", wib.with_ymd_and_hms(2024, 2, 29, 23, 59, 0).unwrap()));
    school
        .store
        .insert_legacy_event(event("first-march", wib.with_ymd_and_hms(2024, 3, 1, 0, 10, 0).unwrap()));

    // 00:30 on 1 March in Jakarta is still 29 February in UTC.
    let now = wib.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
    let stats = school.ledger.admin_dashboard(&school.admin, now).await.unwrap();
    assert_eq!(stats.violations_this_month, 1);
    assert_eq!(stats.achievements_this_month, 0);
}

#[tokio::test]
async fn test_admin_dashboard_matches_direct_counts() {
    let school = school();
    let now = Utc::now().fixed_offset();
    school.store.insert_legacy_event(PointEvent {
        id: "old".to_string(),
        student_id: "s-ani".to_string(),
        issued_by_teacher_id: "guru-a".to_string(),
        description: "last month".to_string(),
        points: 3,
        kind: PointKind::Violation,
        created_at: month_start(&now) - Duration::seconds(1),
        idempotency_key: None,
    });

    for (teacher, student_id, kind) in [
        (&school.teacher_a, "s-ani", PointKind::Violation),
        (&school.teacher_a, "s-citra", PointKind::Violation),
        (&school.teacher_b, "s-budi", PointKind::Achievement),
    ] {
        school
            .ledger
            .submit_point_event(teacher, draft(student_id, kind, 4))
            .await
            .unwrap();
    }

    let stats = school.ledger.admin_dashboard(&school.admin, now).await.unwrap();
    assert_eq!(stats.total_students, 3);
    assert_eq!(stats.total_classrooms, 2);
    assert_eq!(stats.violations_this_month, 2);
    assert_eq!(stats.achievements_this_month, 1);

    let since = month_start(&now);
    assert_eq!(
        stats.violations_this_month,
        school.store.count_events_since(PointKind::Violation, since).await.unwrap()
    );

    assert_denied(school.ledger.admin_dashboard(&school.teacher_a, now).await, DenyReason::Forbidden);

    let teacher = school.ledger.teacher_dashboard(&school.teacher_a).await.unwrap();
    assert_eq!(teacher.classroom_name, "VII A");
    assert_eq!(teacher.student_count, 2);

    let student = school.ledger.student_dashboard(&school.budi).await.unwrap();
    assert_eq!(student.totals.achievement_total, 4);
}

#[tokio::test]
async fn test_student_dashboard_without_record_is_zero() {
    let school = school();
    let orphan = profile("p-orphan", Role::Student, None);
    let stats = school.ledger.student_dashboard(&orphan).await.unwrap();
    assert_eq!(stats.totals, PointTotals::default());

    let err = school.ledger.my_student(&orphan).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_replayed_key_records_once() {
    let school = school();
    let first = school
        .ledger
        .submit_point_event(
            &school.teacher_a,
            draft("s-ani", PointKind::Violation, 10).with_idempotency_key("form-42"),
        )
        .await
        .unwrap();
    assert_eq!(first.totals.violation_total, 10);

    school
        .ledger
        .submit_point_event(&school.teacher_a, draft("s-ani", PointKind::Violation, 4))
        .await
        .unwrap();

    let second = school
        .ledger
        .submit_point_event(
            &school.teacher_a,
            draft("s-ani", PointKind::Violation, 10).with_idempotency_key("form-42"),
        )
        .await
        .unwrap();

    assert!(second.replayed);
    assert_eq!(second.event, first.event);
    // A replay reports the totals as they are now, including later events.
    assert_eq!(second.totals.violation_total, 14);
    assert_eq!(school.store.event_count(), 2);
    assert_eq!(totals_of(&school, "s-ani").await.violation_total, 14);

    let err = school
        .ledger
        .submit_point_event(
            &school.teacher_a,
            draft("s-ani", PointKind::Violation, 99).with_idempotency_key("form-42"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(totals_of(&school, "s-ani").await.violation_total, 14);
}

#[tokio::test]
async fn test_reconcile_repairs_stale_totals() {
    let school = school();
    school.store.insert_legacy_event(PointEvent {
        id: "legacy-1".to_string(),
        student_id: "s-ani".to_string(),
        issued_by_teacher_id: "guru-a".to_string(),
        description: "imported".to_string(),
        points: 7,
        kind: PointKind::Achievement,
        created_at: Utc::now(),
        idempotency_key: None,
    });
    school
        .ledger
        .submit_point_event(&school.teacher_a, draft("s-ani", PointKind::Achievement, 3))
        .await
        .unwrap();
    assert_eq!(totals_of(&school, "s-ani").await.achievement_total, 3);

    assert_denied(school.ledger.reconcile_totals(&school.teacher_a, "s-ani").await, DenyReason::Forbidden);

    let report = school.ledger.reconcile_totals(&school.admin, "s-ani").await.unwrap();
    assert!(!report.was_consistent());
    assert_eq!(report.totals.achievement_total, 10);
    assert_eq!(totals_of(&school, "s-ani").await.achievement_total, 10);
}

#[tokio::test]
async fn test_unknown_student_and_issuer_rules() {
    let school = school();

    let err = school
        .ledger
        .submit_point_event(&school.teacher_a, draft("s-nobody", PointKind::Violation, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = school
        .ledger
        .list_events_for_student(&school.admin, "s-nobody")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));

    let err = school
        .ledger
        .submit_point_event(&school.admin, draft("s-ani", PointKind::Violation, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(school.store.event_count(), 0);
}

#[tokio::test]
async fn test_storage_outage_is_reported() {
    let school = school();
    school.store.set_healthy(false);
    let err = school
        .ledger
        .submit_point_event(&school.teacher_a, draft("s-ani", PointKind::Violation, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));
    assert!(!err.is_user_error());

    school.store.set_healthy(true);
    assert_eq!(school.store.event_count(), 0);
    assert_eq!(totals_of(&school, "s-ani").await, PointTotals::default());
}

#[tokio::test]
async fn test_students_listed_by_name() {
    let school = school();
    let students = school.ledger.list_students(&school.teacher_a, "k-7a").await.unwrap();
    let names: Vec<_> = students.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Ani", "Citra"]);

    let all = school.ledger.list_students(&school.admin, "k-7b").await.unwrap();
    assert_eq!(all.len(), 1);
}
