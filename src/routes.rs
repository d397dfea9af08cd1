pub mod common_models;
pub mod routes;

pub mod activity {
    pub mod activity_handlers;
    pub mod activity_models;
}
pub mod auth {
    pub mod auth_handlers;
    pub mod auth_models;
}
pub mod billing {
    pub mod billing_handlers;
    pub mod billing_models;
}
pub mod category {
    pub mod category_handlers;
    pub mod category_models;
}
pub mod comment {
    pub mod comment_handlers;
    pub mod comment_models;
}
pub mod health {
    pub mod health_handlers;
}
pub mod member {
    pub mod member_handlers;
    pub mod member_models;
}
pub mod onboarding {
    pub mod onboarding_handlers;
    pub mod onboarding_models;
}
pub mod task {
    pub mod task_handlers;
    pub mod task_models;
}
pub mod workspace {
    pub mod workspace_handlers;
    pub mod workspace_models;
}

pub use routes::configure;
