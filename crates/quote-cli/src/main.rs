//! Quote query CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use quote_cli::{bootstrap, CliError, QueryArgs, QueryStats, Services};
use quote_core::{init_logging, AppConfig, LogConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "quote-cli")]
#[command(about = "Batched market quote query runner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (없으면 기본값과 환경 변수만 사용)
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// 로그 레벨 (설정 파일 값보다 우선)
    #[arg(long)]
    log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 1회 조회 후 JSON 응답 출력
    Query(QueryArgs),

    /// 주기적으로 조회 (Ctrl-C로 종료)
    Watch {
        #[command(flatten)]
        query: QueryArgs,

        /// 조회 주기 (초)
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,

        /// Prometheus 메트릭 리스너 주소 (예: 0.0.0.0:9100)
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config).context("설정 로드 실패")?;

    let mut log_config = LogConfig::from_settings(&config.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    if let Some(format) = &cli.log_format {
        log_config.format = format.parse().map_err(CliError::Logging)?;
    }
    init_logging(log_config).map_err(|e| CliError::Logging(e.to_string()))?;

    tracing::info!("Quote CLI 시작");

    let services = bootstrap::build(&config).await?;

    let outcome = match cli.command {
        Commands::Query(args) => run_query(&services, &args).await,
        Commands::Watch {
            query,
            interval_secs,
            metrics_addr,
        } => {
            if let Some(addr) = metrics_addr {
                bootstrap::install_metrics_exporter(addr)?;
            }
            run_watch(&services, &query, Duration::from_secs(interval_secs.max(1))).await
        }
    };

    if let Some(summary) = services.shutdown().await {
        tracing::info!(
            dropped_pending = summary.dropped_pending,
            aborted = summary.aborted,
            "백그라운드 갱신 종료"
        );
    }
    tracing::info!("Quote CLI 종료");

    outcome
}

async fn run_query(services: &Services, args: &QueryArgs) -> anyhow::Result<()> {
    let response = services.pipeline.execute(&args.to_request()).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_watch(services: &Services, args: &QueryArgs, period: Duration) -> anyhow::Result<()> {
    tracing::info!("=== watch 모드 시작 (주기: {}초) ===", period.as_secs());

    let request = args.to_request();
    let mut stats = QueryStats::new();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("종료 신호 수신, watch 종료 중...");
                break;
            }
            _ = interval.tick() => {
                let response = services.pipeline.execute(&request).await?;
                stats.record(&response);
                tracing::info!(
                    round = stats.rounds,
                    cache_hits = response.metadata.cache_hits,
                    realtime = response.metadata.realtime,
                    errors = response.metadata.failed,
                    elapsed_ms = response.metadata.elapsed_ms,
                    "조회 완료"
                );
            }
        }
    }

    let refresh = services.pipeline.scheduler().map(|s| s.stats());
    stats.log_summary("watch", refresh);
    Ok(())
}
