/*!
 * Request context extractor
 *
 * Responsibility:
 * - middleware が作った RequestContext を handler に提供する
 * - 認証の有無で拒否はしない (判断は operation の認可で行う)
 *
 * Public API:
 * - CurrentContext
 */

mod core;

pub use core::CurrentContext;
