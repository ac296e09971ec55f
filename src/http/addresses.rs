use actix_web::http::header::LOCATION;
use actix_web::{web, HttpResponse};

use crate::application::AddressUseCase;
use crate::auth::AuthContext;
use crate::domain::address::AddressRequest;
use crate::domain::ServiceError;

pub const ADDRESSES_PATH: &str = "/api/v1/addresses";

pub async fn create_address(
    addresses: web::Data<AddressUseCase>,
    auth: AuthContext,
    body: web::Json<AddressRequest>,
) -> Result<HttpResponse, ServiceError> {
    let created = addresses.create(&auth, &body).await?;
    Ok(HttpResponse::Created()
        .insert_header((LOCATION, format!("{}/{}", ADDRESSES_PATH, created.id)))
        .json(created))
}

pub async fn list_addresses(
    addresses: web::Data<AddressUseCase>,
    auth: AuthContext,
) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(addresses.list(&auth).await?))
}

pub async fn update_address(
    addresses: web::Data<AddressUseCase>,
    auth: AuthContext,
    id: web::Path<i64>,
    body: web::Json<AddressRequest>,
) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(addresses.edit(&auth, id.into_inner(), &body).await?))
}

pub async fn delete_address(
    addresses: web::Data<AddressUseCase>,
    auth: AuthContext,
    id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    addresses.delete(&auth, id.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
