//! TwinFlow Connection Registry
//!
//! `.twinflow/connections.json` を管理するクラウド間接続の永続ストア。
//! エントリはブリッジ提供時に作成され、ブリッジ破棄時に削除される。
//! conn_id は (エッジ, 送信側, 受信側) の決定論的関数であり、再デプロイは
//! 重複を作らず既存エントリを再利用する。
//!
//! 書き込みは last-writer-wins。同一エッジへの並行変更を防ぐ必要が
//! ある場合はロックファイル（conn_id 粒度の代わりのファイル粒度）を使う。

pub mod error;
pub mod model;
pub mod store;

pub use error::{RegistryError, Result};
pub use model::{ConnectionEntry, conn_id};
pub use store::{ConnectionRegistry, RegistryLock};
