//! Command handlers. Each one runs after the route guard has let the
//! caller through.

use anyhow::{bail, Result};
use chrono::{DateTime, FixedOffset};

use poinsiswa_core::advice::{Advice, AdviceService};
use poinsiswa_core::ledger::SubmittedEvent;
use poinsiswa_core::models::{PointEvent, PointEventDraft, PointKind, Role};
use poinsiswa_core::policy::nav_links;
use poinsiswa_core::utils::{format_date, format_optional, format_timestamp, format_totals, truncate_string};

use crate::app::SignedIn;

const DESCRIPTION_WIDTH: usize = 48;

pub fn whoami(me: &SignedIn) {
    let profile = &me.user.profile;
    println!("{} <{}>", profile.display_name(), me.user.email);
    if profile.role == Role::Teacher {
        println!("Classroom: {}", format_optional(profile.classroom_id.as_deref(), "Belum ditugaskan"));
    }
    let links: Vec<&str> = nav_links(profile.role).iter().map(|l| l.label).collect();
    println!("Menu:      {}", links.join(" | "));
}

pub async fn dashboard(me: &SignedIn, now: DateTime<FixedOffset>) -> Result<()> {
    let profile = &me.user.profile;
    match profile.role {
        Role::Admin => {
            let stats = me.ledger.admin_dashboard(profile, now).await?;
            println!("Total Siswa:                {}", stats.total_students);
            println!("Total Kelas:                {}", stats.total_classrooms);
            println!("Pelanggaran (Bulan Ini):    {}", stats.violations_this_month);
            println!("Prestasi (Bulan Ini):       {}", stats.achievements_this_month);
        }
        Role::Teacher => {
            let stats = me.ledger.teacher_dashboard(profile).await?;
            let name = if stats.classroom_name.is_empty() {
                "Belum ditugaskan"
            } else {
                stats.classroom_name.as_str()
            };
            println!("Kelas Perwalian: {}", name);
            println!("Jumlah Siswa:    {}", stats.student_count);
        }
        Role::Student => {
            let stats = me.ledger.student_dashboard(profile).await?;
            println!("{}", format_totals(&stats.totals));
        }
    }
    Ok(())
}

pub async fn students(me: &SignedIn, classroom: Option<String>) -> Result<()> {
    let profile = &me.user.profile;
    let Some(classroom_id) = classroom.or_else(|| profile.classroom_id.clone()) else {
        bail!("No classroom is assigned to your account");
    };

    let students = me.ledger.list_students(profile, &classroom_id).await?;
    if students.is_empty() {
        println!("Belum ada siswa di kelas ini.");
        return Ok(());
    }
    println!("{:<38} {:<12} {:<24} {:>11} {:>8}", "ID", "NISN", "Nama", "Pelanggaran", "Prestasi");
    for s in &students {
        println!(
            "{:<38} {:<12} {:<24} {:>11} {:>8}",
            s.id,
            s.external_identifier,
            truncate_string(&s.name, 24),
            s.points_violation_total,
            s.points_achievement_total
        );
    }
    Ok(())
}

pub struct RecordArgs {
    pub student: String,
    pub kind: PointKind,
    pub points: i64,
    pub description: String,
    pub key: Option<String>,
    pub advice: bool,
}

pub async fn record(me: &SignedIn, args: RecordArgs, advisor: impl FnOnce() -> AdviceService) -> Result<()> {
    let mut draft = PointEventDraft::new(args.student, args.kind, args.points, args.description);
    if let Some(key) = args.key {
        draft = draft.with_idempotency_key(key);
    }

    let submitted = me.ledger.submit_point_event(&me.user.profile, draft).await?;
    print_submitted(&submitted);

    if args.advice {
        let advice = me.ledger.advice_for_submission(&submitted, &advisor()).await;
        println!();
        print_advice(&advice);
    }
    Ok(())
}

fn print_submitted(submitted: &SubmittedEvent) {
    let event = &submitted.event;
    if submitted.replayed {
        println!("Already recorded earlier, nothing changed.");
    } else {
        println!("Catatan berhasil disimpan.");
    }
    println!("Event:  {}", event.id);
    println!("Jenis:  {} ({} poin)", kind_label(event.kind), event.points);
    println!("Waktu:  {}", format_timestamp(event.created_at));
    println!("Total:  {}", format_totals(&submitted.totals));
}

pub async fn points(me: &SignedIn, student: Option<String>) -> Result<()> {
    let profile = &me.user.profile;
    let student = match student {
        Some(id) => me.ledger.get_student(profile, &id).await?,
        None => me.ledger.my_student(profile).await?,
    };

    let totals = me.ledger.get_aggregates(profile, &student.id).await?;
    let events = me.ledger.events_by_kind(profile, &student.id).await?;

    println!("{}", student.display_name());
    println!("{}", format_totals(&totals));
    print_events("Riwayat Pelanggaran", &events.violations);
    print_events("Riwayat Prestasi", &events.achievements);
    Ok(())
}

fn print_events(title: &str, events: &[PointEvent]) {
    println!();
    println!("{}", title);
    if events.is_empty() {
        println!("  Tidak ada catatan.");
        return;
    }
    for e in events {
        println!(
            "  {:<18} {:>4} poin  {}  [{}]",
            format_date(e.created_at),
            e.points,
            truncate_string(&e.description, DESCRIPTION_WIDTH),
            e.id
        );
    }
}

pub async fn advice(me: &SignedIn, event_id: &str, advisor: &AdviceService) -> Result<()> {
    let advice = me.ledger.request_advice(&me.user.profile, event_id, advisor).await?;
    print_advice(&advice);
    Ok(())
}

fn print_advice(advice: &Advice) {
    if advice.degraded {
        eprintln!("{}", advice.text);
    } else {
        println!("Saran dari AI");
        println!("{}", advice.text);
    }
}

pub async fn reconcile(me: &SignedIn, student_id: &str) -> Result<()> {
    let report = me.ledger.reconcile_totals(&me.user.profile, student_id).await?;
    if report.was_consistent() {
        println!("Totals already match the event log: {}", format_totals(&report.totals));
    } else {
        println!("Stored:    {}", format_totals(&report.stored));
        println!("Event log: {}", format_totals(&report.derived));
        println!("Repaired:  {}", format_totals(&report.totals));
    }
    Ok(())
}

fn kind_label(kind: PointKind) -> &'static str {
    match kind {
        PointKind::Violation => "Pelanggaran",
        PointKind::Achievement => "Prestasi",
    }
}
