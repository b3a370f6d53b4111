use crate::detector::FailurePolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "card-intake")]
#[command(about = "トレーディングカード画像の一括取り込み・カード検出ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// フォルダ内の画像からカードを検出してJSONを出力
    Process {
        /// 画像フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 出力JSONファイル（デフォルト: 入力フォルダ/detections.json）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 検出失敗時の扱い（省略時は設定ファイルの値）
        #[arg(long)]
        policy: Option<FailurePolicy>,

        /// 進捗表示のバッチサイズ
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// キャッシュを使わずに再検出
        #[arg(long)]
        no_cache: bool,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,
    },

    /// 検出結果をレビューしてカードを作成
    Review {
        /// `process` が出力したJSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// すべての検出カードを作成（対話なし）
        #[arg(long, conflicts_with = "select")]
        all: bool,

        /// 作成するカードIDをカンマ区切りで指定（対話なし）
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,

        /// 矩形を修正（ID=x,y,幅,高さ）。複数指定可
        #[arg(long)]
        edit: Vec<String>,

        /// カードライブラリのJSONファイル
        #[arg(long)]
        library: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 検出失敗時の扱いを設定
        #[arg(long)]
        set_policy: Option<FailurePolicy>,

        /// 検出タイムアウト秒数を設定（0で無効）
        #[arg(long)]
        set_timeout: Option<u64>,

        /// カードライブラリのパスを設定
        #[arg(long)]
        set_library: Option<PathBuf>,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}
