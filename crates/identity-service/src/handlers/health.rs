/// Liveness probe. Does not touch PostgreSQL or Redis.
pub async fn health_check() -> &'static str {
    "OK"
}
