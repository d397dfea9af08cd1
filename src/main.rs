use std::{io, sync::Arc};

use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use sqlx::mysql::MySqlPoolOptions;

use taskflow_backend::{
    config::AppConfig,
    routes,
    services::{
        cleanup,
        email_worker::EmailWorker,
        mailer::{LogMailer, Mailer},
        reminder_worker::ReminderWorker,
    },
};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let pool = MySqlPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to create pool: {}", e);
            io::Error::other(e)
        })?;

    if config.run_migrations {
        sqlx::migrate!().run(&pool).await.map_err(|e| {
            error!("Failed to run migrations: {}", e);
            io::Error::other(e)
        })?;
        info!("Database migrations applied");
    }

    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    EmailWorker::new(pool.clone(), mailer, &config).spawn();
    ReminderWorker::new(pool.clone(), &config).spawn();
    cleanup::spawn(pool.clone());

    let bind_address = config.bind_address.clone();
    info!("Server running at http://{}", bind_address);

    let pool = web::Data::new(pool);
    let config = web::Data::new(config);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(pool.clone())
            .app_data(config.clone())
            .configure(routes::configure)
    })
    .bind(bind_address)?
    .run()
    .await
}
