// ============================================================================
// HTTP surface
// ============================================================================
//
// POST   /api/v1/customers          open signup
// GET    /api/v1/customers/me       logged customer
// DELETE /api/v1/customers/me
// GET    /api/v1/customers/{id}
// PUT    /api/v1/customers/{id}
// DELETE /api/v1/customers/{id}
// POST   /api/v1/addresses          scoped to the logged customer
// GET    /api/v1/addresses
// PUT    /api/v1/addresses/{id}
// DELETE /api/v1/addresses/{id}
//
// Everything except signup requires a bearer token with USER or ADMIN.
// `/customers/{id}` additionally requires the caller to own the record,
// unless they hold ADMIN.
//
// ============================================================================

mod addresses;
mod customers;
pub mod errors;

use actix_web::web;

/// Registers every API route. `/customers/me` goes before `/customers/{id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(errors::json_error_handler))
        .service(
            web::scope("/api/v1/customers")
                .route("", web::post().to(customers::create_customer))
                .route("/me", web::get().to(customers::get_logged_customer))
                .route("/me", web::delete().to(customers::delete_logged_customer))
                .route("/{id}", web::get().to(customers::get_customer))
                .route("/{id}", web::put().to(customers::update_customer))
                .route("/{id}", web::delete().to(customers::delete_customer)),
        )
        .service(
            web::scope("/api/v1/addresses")
                .route("", web::post().to(addresses::create_address))
                .route("", web::get().to(addresses::list_addresses))
                .route("/{id}", web::put().to(addresses::update_address))
                .route("/{id}", web::delete().to(addresses::delete_address)),
        );
}
