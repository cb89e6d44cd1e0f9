use std::sync::Arc;

use crate::{
    credentials::TokenIssuer,
    db::{DbPool, OrmConn},
    images::ImageHost,
    oauth::GoogleOAuth,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub tokens: TokenIssuer,
    pub images: Arc<dyn ImageHost>,
    pub google: Option<Arc<GoogleOAuth>>,
    pub frontend_url: String,
}
