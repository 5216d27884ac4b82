use crate::grid::read_csv_grid;
use crate::import::{
    AddFile, Commit, DiscardFile, GetPlans, GetProgress, ImportService, Stop,
};
use actix::Addr;
use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::{delete, get, post, web::Data, web::Path, HttpResponse};
use anyhow::Context;
use derive_more::{Display, Error};
use std::io::Read;

pub type Response = Result<HttpResponse, ControllerError>;

#[derive(Debug, Display, Error)]
pub enum ControllerError {
    #[error(ignore)]
    #[display("{reason}")]
    RejectedFile { reason: String },
    #[error(ignore)]
    InternalServerError(anyhow::Error),
}

impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalServerError(err)
    }
}

impl From<actix::MailboxError> for ControllerError {
    fn from(err: actix::MailboxError) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl actix_web::error::ResponseError for ControllerError {
    fn error_response(&self) -> HttpResponse {
        log::warn!("{self:?}\n");
        match self {
            ControllerError::RejectedFile { reason } => {
                HttpResponse::BadRequest().json(serde_json::json!({ "error": reason }))
            }
            ControllerError::InternalServerError(err) => HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": err.to_string() })),
        }
    }
}

#[derive(MultipartForm, Debug)]
pub struct UploadQuery {
    file: TempFile,
}

#[post("/import/upload")]
async fn upload_file(
    service: Data<Addr<ImportService>>,
    q: MultipartForm<UploadQuery>,
) -> Response {
    let q = q.into_inner();
    let name = q
        .file
        .file_name
        .clone()
        .unwrap_or_else(|| "planilha.csv".to_string());
    let mut data = Vec::new();
    q.file
        .file
        .as_file()
        .read_to_end(&mut data)
        .context("Unable to read uploaded file")?;
    let grid = read_csv_grid(&data).map_err(|err| ControllerError::RejectedFile {
        reason: format!("Arquivo inválido: {err}"),
    })?;
    let plan = service
        .send(AddFile { name, grid })
        .await
        .context("Unable to send message to ImportService")?
        .map_err(|err| ControllerError::RejectedFile {
            reason: err.to_string(),
        })?;
    Ok(HttpResponse::Ok().json(plan))
}

#[get("/import/plans")]
async fn plans(service: Data<Addr<ImportService>>) -> Response {
    let plans = service
        .send(GetPlans)
        .await
        .context("Unable to send message to ImportService")?;
    Ok(HttpResponse::Ok().json(plans))
}

#[delete("/import/files/{name}")]
async fn discard_file(service: Data<Addr<ImportService>>, name: Path<String>) -> Response {
    service
        .send(DiscardFile(name.into_inner()))
        .await
        .context("Unable to send message to ImportService")?;
    Ok(HttpResponse::NoContent().body(()))
}

#[post("/import/commit")]
async fn commit(service: Data<Addr<ImportService>>) -> Response {
    service
        .send(Commit)
        .await
        .context("Unable to send message to ImportService")?
        .map_err(|err| ControllerError::RejectedFile {
            reason: err.to_string(),
        })?;
    Ok(HttpResponse::Accepted().body(()))
}

#[get("/import/progress")]
async fn progress(service: Data<Addr<ImportService>>) -> Response {
    let snapshot = service
        .send(GetProgress)
        .await
        .context("Unable to send message to ImportService")?;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[post("/import/stop")]
async fn stop(service: Data<Addr<ImportService>>) -> Response {
    service
        .send(Stop)
        .await
        .context("Unable to send message to ImportService")?;
    Ok(HttpResponse::Accepted().body(()))
}
