/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: Authorization ヘッダ → RequestContext (拒否はしない)
 * - http / cors / security_headers: 横断的な transport 設定
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
