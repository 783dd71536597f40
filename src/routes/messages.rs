use actix_web::{delete, get, http::StatusCode, patch, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

use crate::databases::messages::{MessageJson, MessageStore, NewMessage};
use crate::errors::ApiError;

/// Message bodies have no length constraint of their own; this only bounds
/// what a single request may buffer.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct CreateMessageReq {
    pub body: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMessageReq {
    pub body: Option<String>,
}

// Oversized payloads surface as a JSON 413; any other read failure counts as
// no payload at all.
fn read_payload(
    payload: Result<web::Bytes, actix_web::Error>,
) -> Result<web::Bytes, ApiError> {
    match payload {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.as_response_error().status_code() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(ApiError::PayloadTooLarge)
        }
        Err(e) => {
            log::warn!("unreadable request payload: {e}");
            Ok(web::Bytes::new())
        }
    }
}

fn parse_create(payload: &[u8]) -> Result<NewMessage, ApiError> {
    let value: Value = serde_json::from_slice(payload).map_err(|_| ApiError::Validation)?;
    if !value.is_object() {
        return Err(ApiError::Validation);
    }
    let req: CreateMessageReq =
        serde_json::from_value(value).map_err(|_| ApiError::Validation)?;

    match (req.body, req.username) {
        (Some(body), Some(username)) => Ok(NewMessage { body, username }),
        _ => Err(ApiError::Validation),
    }
}

// Absent, unparseable or non-object payloads carry no `body` key and update
// nothing; an object whose `body` is not a string is rejected.
fn parse_update(payload: &[u8]) -> Result<UpdateMessageReq, ApiError> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(value) if value.is_object() => {
            serde_json::from_value(value).map_err(|_| ApiError::Validation)
        }
        _ => Ok(UpdateMessageReq::default()),
    }
}

#[get("/messages")]
pub async fn get_messages(store: web::Data<MessageStore>) -> Result<HttpResponse, ApiError> {
    let messages: Vec<MessageJson> = store.list().await?.iter().map(|m| m.to_json()).collect();
    Ok(HttpResponse::Ok().json(messages))
}

#[post("/messages")]
pub async fn post_message(
    store: web::Data<MessageStore>,
    payload: Result<web::Bytes, actix_web::Error>,
) -> Result<HttpResponse, ApiError> {
    let new_message = parse_create(&read_payload(payload)?)?;
    let message = store.create(new_message).await?;
    log::info!("created {}", message);
    Ok(HttpResponse::Created().json(message.to_json()))
}

#[patch("/messages/{id}")]
pub async fn patch_message(
    store: web::Data<MessageStore>,
    id: web::Path<i64>,
    payload: Result<web::Bytes, actix_web::Error>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    let req = parse_update(&read_payload(payload)?)?;

    let message = store
        .update_body(id, req.body)
        .await?
        .ok_or(ApiError::NotFound)?;
    log::info!("updated {}", message);
    Ok(HttpResponse::Ok().json(message.to_json()))
}

#[delete("/messages/{id}")]
pub async fn delete_message(
    store: web::Data<MessageStore>,
    id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    if !store.delete(id).await? {
        return Err(ApiError::NotFound);
    }
    log::info!("deleted message {}", id);
    Ok(HttpResponse::NoContent().finish())
}

pub fn init(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PathConfig::default().error_handler(|_, _| ApiError::NotFound.into()));
    cfg.app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES));
    cfg.service(get_messages);
    cfg.service(post_message);
    cfg.service(patch_message);
    cfg.service(delete_message);
}
