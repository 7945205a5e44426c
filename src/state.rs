/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - auth: AuthService (JWKS キャッシュ / 検証 / 認可テーブル), operations: resolver registry
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::services::{auth::AuthService, operations::OperationRegistry};

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub operations: Arc<OperationRegistry>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, operations: Arc<OperationRegistry>) -> Self {
        Self { auth, operations }
    }
}
