pub mod alerts;
pub mod disease;
pub mod finance;
pub mod price;
pub mod recommend;
pub mod sustainability;
pub mod system;
pub mod twin;
pub mod validation;
pub mod weather;
