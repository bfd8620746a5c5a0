use axum::{Json, Router, routing::post};

use crate::data::{SchedulingInput, SchedulingOutput};
use crate::error::ScheduleError;
use crate::solver::{self, SolveOptions};

async fn solve_handler(
    Json(input): Json<SchedulingInput>,
) -> Result<Json<SchedulingOutput>, (axum::http::StatusCode, String)> {
    use axum::http::StatusCode;
    // the solve blocks for up to a stall window; keep it off the runtime
    let result = tokio::task::spawn_blocking(move || {
        solver::solve(&input, &SolveOptions::default())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match result {
        Ok(output) => Ok(Json(output)),
        Err(
            e @ (ScheduleError::Infeasible | ScheduleError::StructurallyInfeasible { .. }),
        ) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

pub async fn run_server() {
    let app = Router::new().route("/v1/timetable/solve", post(solve_handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .unwrap();

    println!("Server running at http://{}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
