//! Follow-up advice for recorded point events.
//!
//! Advice is generated by an external text model after an event has been
//! recorded. It is purely advisory: failures here never touch the ledger and
//! are reported as a degraded `Advice` instead of an error.

mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::LedgerResult;
use crate::models::{PointEvent, PointKind, Student};

pub use gemini::{GeminiClient, DEFAULT_MODEL};

/// Shown when no advice API key is configured.
pub const ADVICE_DISABLED_MESSAGE: &str =
    "Fitur AI dinonaktifkan karena API Key tidak ditemukan. Mohon konfigurasikan environment variable API_KEY.";

/// Shown when the advice service could not be reached or returned nothing usable.
pub const ADVICE_FAILED_MESSAGE: &str =
    "Terjadi kesalahan saat mencoba mendapatkan saran dari AI. Silakan coba lagi nanti.";

/// A text generation backend.
#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    /// Generate a completion for `prompt`. Errors are `LedgerError::Service`.
    async fn generate(&self, prompt: &str) -> LedgerResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advice {
    pub text: String,
    /// True when `text` is a fallback message rather than generated advice.
    pub degraded: bool,
}

impl Advice {
    fn fallback(text: &str) -> Self {
        Self {
            text: text.to_string(),
            degraded: true,
        }
    }
}

/// Build the counselling prompt for one event.
pub fn build_prompt(event: &PointEvent, student_name: &str) -> String {
    let heading = match event.kind {
        PointKind::Violation => "Pelanggaran",
        PointKind::Achievement => "Prestasi",
    };
    let example = match event.kind {
        PointKind::Violation => {
            "Contoh untuk pelanggaran: \"1. Ajak siswa berbicara secara pribadi...\", \"2. Cari tahu akar masalah...\", \"3. Berikan konsekuensi yang mendidik...\"."
        }
        PointKind::Achievement => {
            "Contoh untuk prestasi: \"1. Berikan pujian tulus di depan kelas...\", \"2. Informasikan kepada orang tua...\", \"3. Jadikan contoh bagi siswa lain...\"."
        }
    };

    format!(
        "Anda adalah seorang psikolog pendidikan dan konselor sekolah yang berpengalaman.\n\
         Seorang guru telah mencatat sebuah {kind} untuk siswa bernama {name}.\n\
         Detailnya adalah sebagai berikut:\n\
         - {heading}: {description}\n\
         - Poin yang diberikan: {points}\n\
         \n\
         Tolong berikan saran yang konstruktif dan praktis kepada guru tentang bagaimana cara menindaklanjuti hal ini.\n\
         Saran harus positif, mendidik, dan fokus pada pengembangan karakter siswa.\n\
         Format jawaban Anda dalam bentuk poin-poin singkat dan jelas dalam Bahasa Indonesia.\n\
         {example}",
        kind = event.kind.as_str(),
        name = student_name,
        heading = heading,
        description = event.description,
        points = event.points,
        example = example,
    )
}

/// Wraps an optional generator and turns every failure into a fallback.
#[derive(Clone)]
pub struct AdviceService {
    generator: Option<Arc<dyn AdviceGenerator>>,
}

impl AdviceService {
    pub fn new(generator: Arc<dyn AdviceGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// A service with no backend; every request returns the disabled message.
    pub fn disabled() -> Self {
        Self { generator: None }
    }

    pub async fn advise(&self, event: &PointEvent, student: &Student) -> Advice {
        let Some(generator) = &self.generator else {
            return Advice::fallback(ADVICE_DISABLED_MESSAGE);
        };

        let prompt = build_prompt(event, &student.name);
        debug!(event_id = %event.id, "Requesting advice");

        match generator.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => Advice {
                text: text.trim().to_string(),
                degraded: false,
            },
            Ok(_) => {
                warn!(event_id = %event.id, "Advice service returned an empty response");
                Advice::fallback(ADVICE_FAILED_MESSAGE)
            }
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Advice request failed");
                Advice::fallback(ADVICE_FAILED_MESSAGE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use chrono::Utc;

    struct Echo;

    #[async_trait]
    impl AdviceGenerator for Echo {
        async fn generate(&self, prompt: &str) -> LedgerResult<String> {
            Ok(format!("  saran untuk: {}  ", prompt.len()))
        }
    }

    struct Broken;

    #[async_trait]
    impl AdviceGenerator for Broken {
        async fn generate(&self, _prompt: &str) -> LedgerResult<String> {
            Err(LedgerError::Service("upstream timeout".to_string()))
        }
    }

    fn event(kind: PointKind) -> PointEvent {
        PointEvent {
            id: "e-1".to_string(),
            student_id: "s-1".to_string(),
            issued_by_teacher_id: "t-1".to_string(),
            description: "Membantu teman".to_string(),
            points: 15,
            kind,
            created_at: Utc::now(),
            idempotency_key: None,
        }
    }

    fn student() -> Student {
        Student {
            id: "s-1".to_string(),
            external_identifier: "0012345678".to_string(),
            name: "Ani".to_string(),
            classroom_id: "k-1".to_string(),
            points_violation_total: 0,
            points_achievement_total: 15,
            linked_profile_id: "p-ani".to_string(),
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let e = event(PointKind::Achievement);
        let prompt = build_prompt(&e, "Ani");
        assert_eq!(prompt, build_prompt(&e, "Ani"));
        assert!(prompt.contains("sebuah prestasi untuk siswa bernama Ani"));
        assert!(prompt.contains("- Prestasi: Membantu teman"));
        assert!(prompt.contains("- Poin yang diberikan: 15"));
        assert!(prompt.contains("Contoh untuk prestasi"));
        assert!(!prompt.contains("Contoh untuk pelanggaran"));
    }

    #[test]
    fn test_prompt_for_violation() {
        let prompt = build_prompt(&event(PointKind::Violation), "Budi");
        assert!(prompt.contains("- Pelanggaran: Membantu teman"));
        assert!(prompt.contains("Contoh untuk pelanggaran"));
    }

    #[tokio::test]
    async fn test_disabled_service() {
        let advice = AdviceService::disabled()
            .advise(&event(PointKind::Violation), &student())
            .await;
        assert!(advice.degraded);
        assert_eq!(advice.text, ADVICE_DISABLED_MESSAGE);
    }

    #[tokio::test]
    async fn test_generated_advice_is_trimmed() {
        let advice = AdviceService::new(Arc::new(Echo))
            .advise(&event(PointKind::Achievement), &student())
            .await;
        assert!(!advice.degraded);
        assert!(advice.text.starts_with("saran untuk:"));
    }

    #[tokio::test]
    async fn test_failure_degrades() {
        let advice = AdviceService::new(Arc::new(Broken))
            .advise(&event(PointKind::Achievement), &student())
            .await;
        assert!(advice.degraded);
        assert_eq!(advice.text, ADVICE_FAILED_MESSAGE);
    }
}
