use actix_web::{middleware, web, App, HttpResponse, HttpServer, Responder};
use log::warn;
use maze_pursuit::api::{ErrorResponse, EvaluateRequest, EvaluateResponse, ServiceInfo};
use maze_pursuit::fitness::evaluate;

async fn info() -> impl Responder {
    HttpResponse::Ok().json(ServiceInfo::default())
}

async fn evaluate_map(req: web::Json<EvaluateRequest>) -> HttpResponse {
    let req = req.into_inner();
    let result =
        web::block(move || evaluate(&req.genome, req.width, req.height, &req.settings)).await;

    match result {
        Ok(Ok(eval)) => HttpResponse::Ok().json(EvaluateResponse::from(eval)),
        Ok(Err(e)) => {
            warn!("rejected evaluation: {}", e);
            HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            })
        }
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        }),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    HttpServer::new(|| {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let body = ErrorResponse {
                    error: err.to_string(),
                };
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(body),
                )
                .into()
            }))
            .route("/evaluate", web::post().to(evaluate_map))
            .route("/", web::get().to(info))
    })
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
