use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{MySqlExecutor, MySqlPool};

use super::string_enum;

string_enum! {
    pub enum OnboardingStep {
        CreateWorkspace => "create_workspace",
        CreateCategory => "create_category",
        CreateTask => "create_task",
        InviteTeammate => "invite_teammate",
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StepState {
    pub step: OnboardingStep,
    pub completed: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OnboardingStatus {
    pub steps: Vec<StepState>,
    pub completed: bool,
    pub dismissed: bool,
}

impl OnboardingStatus {
    pub fn build(done: &[OnboardingStep], dismissed_at: Option<DateTime<Utc>>) -> Self {
        let steps: Vec<StepState> = OnboardingStep::ALL
            .iter()
            .map(|step| StepState {
                step: *step,
                completed: done.contains(step),
            })
            .collect();
        let completed = steps.iter().all(|s| s.completed);
        OnboardingStatus {
            steps,
            completed,
            dismissed: dismissed_at.is_some(),
        }
    }
}

pub struct Onboarding;

impl Onboarding {
    /// Idempotent: completing a step twice keeps the first timestamp.
    pub async fn complete<'e, E: MySqlExecutor<'e>>(
        executor: E,
        user_id: i64,
        step: OnboardingStep,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT IGNORE INTO onboarding_steps (user_id, step, completed_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(step.as_str())
            .bind(Utc::now())
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn completed_steps(pool: &MySqlPool, user_id: i64) -> Result<Vec<OnboardingStep>, sqlx::Error> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT step FROM onboarding_steps WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        // Steps retired from the checklist are ignored rather than failing the request.
        Ok(rows.iter().filter_map(|step| step.parse().ok()).collect())
    }

    pub async fn dismiss(pool: &MySqlPool, user_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET onboarding_dismissed_at = COALESCE(onboarding_dismissed_at, ?) WHERE user_id = ?",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lists_every_step_in_order() {
        let status = OnboardingStatus::build(&[OnboardingStep::CreateTask], None);
        let order: Vec<OnboardingStep> = status.steps.iter().map(|s| s.step).collect();
        assert_eq!(order, OnboardingStep::ALL.to_vec());
        assert!(status.steps[2].completed);
        assert!(!status.completed);
        assert!(!status.dismissed);
    }

    #[test]
    fn all_steps_done_completes_onboarding() {
        let status = OnboardingStatus::build(OnboardingStep::ALL, Some(Utc::now()));
        assert!(status.completed);
        assert!(status.dismissed);
    }

    #[test]
    fn steps_serialize_as_snake_case() {
        let json = serde_json::to_value(OnboardingStatus::build(&[], None)).unwrap();
        assert_eq!(json["steps"][0]["step"], "create_workspace");
    }
}
