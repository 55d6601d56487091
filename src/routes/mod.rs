use crate::state::AppState;
use axum::Router;

pub mod crops;
pub mod diseases;
pub mod planning;
pub mod prices;
pub mod system;
pub mod weather;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(system::router())
        .merge(crops::router())
        .merge(prices::router())
        .merge(diseases::router())
        .merge(weather::router())
        .merge(planning::router())
}
