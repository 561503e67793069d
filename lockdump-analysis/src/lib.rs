//! lockdump デッドロック解析
//!
//! このクレートは、セッションから得たミューテックス待ちを待ちグラフにまとめ、
//! デッドロックを説明するのに必要な最小限のスレッドを選び出します。
//! 選び方（ポリシー）は常に呼び出し側が明示します。

pub mod policy;
pub mod report;
pub mod selector;
pub mod wait_graph;

pub use policy::{PolicyParseError, SelectionPolicy};
pub use report::{analyze, render, Report};
pub use selector::DeadlockSetSelector;
pub use wait_graph::{WaitEdge, WaitGraph};

/// 解析の結果型
pub type Result<T> = anyhow::Result<T>;
