use actix_web::http::header::LOCATION;
use actix_web::{web, HttpResponse};

use crate::application::CustomerUseCase;
use crate::auth::AuthContext;
use crate::domain::customer::{CustomerRequest, CustomerUpdate};
use crate::domain::ServiceError;

pub const CUSTOMERS_PATH: &str = "/api/v1/customers";

/// Open signup.
pub async fn create_customer(
    customers: web::Data<CustomerUseCase>,
    body: web::Json<CustomerRequest>,
) -> Result<HttpResponse, ServiceError> {
    let created = customers.create(&body).await?;
    Ok(HttpResponse::Created()
        .insert_header((LOCATION, format!("{}/{}", CUSTOMERS_PATH, created.id)))
        .json(created))
}

pub async fn get_logged_customer(
    customers: web::Data<CustomerUseCase>,
    auth: AuthContext,
) -> Result<HttpResponse, ServiceError> {
    Ok(HttpResponse::Ok().json(customers.find_logged(&auth).await?))
}

pub async fn delete_logged_customer(
    customers: web::Data<CustomerUseCase>,
    auth: AuthContext,
) -> Result<HttpResponse, ServiceError> {
    customers.delete_logged(&auth).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// By id: the caller's own record, or any record for ADMIN.
pub async fn get_customer(
    customers: web::Data<CustomerUseCase>,
    auth: AuthContext,
    id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    customers.authorize(&auth, id).await?;
    Ok(HttpResponse::Ok().json(customers.find(id).await?))
}

pub async fn update_customer(
    customers: web::Data<CustomerUseCase>,
    auth: AuthContext,
    id: web::Path<i64>,
    body: web::Json<CustomerUpdate>,
) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    customers.authorize(&auth, id).await?;
    Ok(HttpResponse::Ok().json(customers.edit(id, &body).await?))
}

pub async fn delete_customer(
    customers: web::Data<CustomerUseCase>,
    auth: AuthContext,
    id: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let id = id.into_inner();
    customers.authorize(&auth, id).await?;
    customers.delete(id).await?;
    Ok(HttpResponse::NoContent().finish())
}
