use serde::Serialize;

use crate::models::onboarding::OnboardingStatus;

#[derive(Serialize)]
pub struct OnboardingResponse {
    pub success: bool,
    pub onboarding: OnboardingStatus,
}
