// src/api/routes.rs
use crate::api::handlers;
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .route("/stats", web::get().to(handlers::stats))
            .route("/accounts", web::post().to(handlers::create_account))
            .route("/accounts/{id}", web::get().to(handlers::account))
            .route(
                "/accounts/{id}/recharge",
                web::post().to(handlers::recharge),
            )
            // the administrative collaborator replaces the table wholesale
            .route("/rate-cards", web::put().to(handlers::replace_rate_cards)),
    );
}
