use anyhow::Context;
use card_intake::{cli, config, creator, detector, notify, progress, review, scanner, session};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use detector::{BatchDetector, CacheFile, CachedDetector, CardDetector, RunOutcome, SimpleDetector};
use notify::{LogNotifier, Notifier};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    // 通知はLogNotifierが端末に出すのでログからは外す
    let default = if verbose {
        "card_intake=debug,notify=off,warn"
    } else {
        "notify=off,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = Config::load().context("設定ファイルを読み込めません")?;

    match cli.command {
        Commands::Process { folder, output, policy, batch_size, no_cache, recursive } => {
            println!("🃏 card-intake - カード検出\n");

            // 1. スキャン
            println!("[1/3] ファイルをスキャン中...");
            let files = scanner::scan_folder(&folder, recursive)?;
            println!("✔ {}件のファイルを検出\n", files.len());

            // 2. 検出
            let use_cache = config.use_cache && !no_cache;
            let cached = use_cache
                .then(|| Arc::new(CachedDetector::new(SimpleDetector, CacheFile::load(&folder))));
            let inner: Arc<dyn CardDetector> = if let Some(cached) = &cached {
                cached.clone()
            } else {
                Arc::new(SimpleDetector)
            };

            let batch = BatchDetector::new(inner)
                .with_policy(policy.unwrap_or(config.failure_policy))
                .with_timeout(config.detect_timeout())
                .with_batch_size(batch_size.unwrap_or(config.batch_size));

            let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
            let mut session = session::BatchSession::new(batch, notifier);
            session.add_files(files)?;

            // Ctrl-Cは次のファイルの手前で止める
            let tracker = session.tracker();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracker.cancel();
                }
            });

            println!("[2/3] カード検出中...{}", if use_cache { " (キャッシュ有効)" } else { "" });
            let console = progress::ConsoleProgress::new(cli.verbose);
            let outcome = session.process_queue(&console).await;

            if let Some(cached) = &cached {
                if cli.verbose {
                    println!("  キャッシュヒット: {}件", cached.hits());
                }
                if let Err(e) = cached.save(&folder) {
                    warn!(error = %e, "キャッシュを保存できません");
                }
            }

            let Some(report) = outcome? else {
                println!("既に処理中です");
                return Ok(());
            };
            println!("  {}\n", session.queue().counts());

            // 3. 保存
            if report.outcome == RunOutcome::Cancelled {
                println!("⚠ キャンセルされました（{}件処理済み、結果は保存していません）", report.processed);
                return Ok(());
            }
            println!("[3/3] 結果を保存中...");
            let output = output.unwrap_or_else(|| folder.join("detections.json"));
            report
                .save_results(&output)
                .with_context(|| format!("書き込めません: {}", output.display()))?;
            println!("✔ 結果を保存: {} ({}枚)", output.display(), report.total_detected());

            println!("\n✅ 検出完了");
        }

        Commands::Review { input, all, select, edit, library } => {
            println!("🃏 card-intake - レビュー\n");

            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("読み込めません: {}", input.display()))?;
            let results: Vec<card_intake_common::DetectionResult> = serde_json::from_str(&content)?;
            let detections = review::collect_detections(&results);

            if detections.is_empty() {
                println!("検出カードがありません");
                return Ok(());
            }

            let mut stage = review::ReviewStage::new();
            stage.open(detections);

            for arg in &edit {
                let (id, bounds) = review::parse_edit(arg)?;
                stage.edit(&id, bounds)?;
                println!("✔ {} を修正しました", id);
            }

            let proceed = if all {
                true
            } else if !select.is_empty() {
                stage.set_selection(select);
                true
            } else {
                review::run_interactive_review(&mut stage)?
            };

            if !proceed {
                stage.start_over();
                println!("中止しました（カードは作成されていません）");
                return Ok(());
            }

            let library_path = resolve_library(library, &config)?;
            let library = creator::JsonCardLibrary::new(&library_path);
            let ids = stage.confirm_selected(&library).await?;

            println!("✔ {}枚のカードを作成: {}", ids.len(), library_path.display());
            println!("\n✅ レビュー完了");
        }

        Commands::Config { show, set_policy, set_timeout, set_library } => {
            let mut config = config;
            let mut changed = false;

            if let Some(policy) = set_policy {
                config.failure_policy = policy;
                changed = true;
            }
            if let Some(seconds) = set_timeout {
                config.timeout_seconds = seconds;
                changed = true;
            }
            if let Some(path) = set_library {
                config.library_path = Some(path);
                changed = true;
            }

            if changed {
                config.save()?;
                println!("✔ 設定を保存しました");
            }

            if show || !changed {
                println!("設定:");
                println!("  失敗時の扱い: {}", config.failure_policy);
                println!("  バッチサイズ: {}", config.batch_size);
                println!("  タイムアウト: {}", match config.timeout_seconds {
                    0 => "なし".to_string(),
                    s => format!("{}秒", s),
                });
                println!("  キャッシュ: {}", if config.use_cache { "有効" } else { "無効" });
                println!("  ライブラリ: {}", config.library_path()?.display());
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            cache_command(&target, clear, info);
        }
    }

    Ok(())
}

fn resolve_library(explicit: Option<PathBuf>, config: &Config) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(config.library_path()?),
    }
}

fn cache_command(target: &Path, clear: bool, info: bool) {
    let cache_path = CacheFile::cache_path(target);

    if info || !clear {
        // デフォルトまたは--info: 情報表示
        if cache_path.exists() {
            let cache = CacheFile::load(target);
            println!("キャッシュ情報:");
            println!("  パス: {}", cache_path.display());
            println!("  件数: {}", cache.len());
            if let Ok(meta) = std::fs::metadata(&cache_path) {
                println!("  サイズ: {} bytes", meta.len());
            }
        } else {
            println!("キャッシュファイルが存在しません: {}", cache_path.display());
        }
    }

    if clear {
        match CacheFile::clear(target) {
            Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
            Ok(false) => println!("キャッシュファイルが存在しません"),
            Err(e) => println!("キャッシュ削除エラー: {}", e),
        }
    }
}
