use axum::{extract::State, http::StatusCode, Json};
use std::sync::{Arc, Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

use crate::db::dbsessions;
use crate::models::{DiagnosticsResponse, ErrorResponse};
use crate::ws::registry::RoomRegistry;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Operational snapshot: live rooms and connections, stored session
/// count, and process stats.
pub async fn diagnostics(
    State(registry): State<Arc<RoomRegistry>>,
) -> Result<(StatusCode, Json<DiagnosticsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let n_rooms = registry.room_count().await as u32;
    let n_conn = registry.connection_count() as u32;

    let n_sessions = match dbsessions::get_db() {
        Some(db) => db.count_sessions().await.unwrap_or(0) as u32,
        None => 0,
    };

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| Mutex::new(System::new_all()));
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0),
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Rooms: {}, Sessions: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        n_conn,
        n_rooms,
        n_sessions
    );

    Ok((
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_conn,
            n_rooms,
            n_sessions,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    ))
}
