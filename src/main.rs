use actix::prelude::*;
use actix_multipart::form::MultipartFormConfig;
use actix_web::{web::Data, App, HttpServer};
use anyhow::Context as AnyhowContext;
use estoque_import::catalog::SqliteCatalogRepository;
use estoque_import::import::ImportService;
use estoque_import::{controllers, SELF_ADDR};
use estoque_types::CatalogRepository;
use std::env;
use std::sync::Arc;
use tokio_rusqlite::Connection;

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    let database_path = envmnt::get_or("DATABASE_PATH", "./estoque.db");
    let conn = Connection::open(&database_path)
        .await
        .with_context(|| format!("Unable to open database at {database_path}"))?;
    let catalog: Arc<dyn CatalogRepository> =
        Arc::new(SqliteCatalogRepository::init(conn).await?);

    let import_service = ImportService::new(catalog).start();

    let addr = SELF_ADDR.clone();
    let port: u16 = envmnt::get_parse("SELF_PORT").unwrap_or(8080);
    log::info!("Starting import service on {addr}:{port}");
    HttpServer::new(move || {
        App::new()
            .app_data(MultipartFormConfig::default().total_limit(50 * 1024 * 1024))
            .app_data(Data::new(import_service.clone()))
            .service(controllers::upload_file)
            .service(controllers::plans)
            .service(controllers::discard_file)
            .service(controllers::commit)
            .service(controllers::progress)
            .service(controllers::stop)
    })
    .bind((addr.as_str(), port))
    .with_context(|| format!("Failed to bind server to {}:{port}. Is the port already in use?", *SELF_ADDR))?
    .run()
    .await?;
    Ok(())
}
