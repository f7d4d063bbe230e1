//! tracing 기반 로깅 초기화.
//!
//! 출력 형식:
//! - **pretty**: 개발용 사람이 읽기 쉬운 형식
//! - **json**: 운영환경/로그 집계용 JSON 형식
//! - **compact**: 한 줄 형식

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "quote_query=debug")
    pub level: String,
    pub format: LogFormat,
    /// span 진입/종료 이벤트 포함 여부
    pub with_span_events: bool,
    /// 파일명과 줄 번호 포함 여부
    pub with_file: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    /// 애플리케이션 설정의 logging 섹션에서 생성합니다.
    ///
    /// 알 수 없는 형식 문자열은 pretty로 처리합니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        Self {
            level: settings.level.clone(),
            format: settings.format.parse().unwrap_or_default(),
            ..Default::default()
        }
    }

    /// `RUST_LOG`, `LOG_FORMAT` 환경 변수에서 생성합니다.
    pub fn from_env() -> Self {
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self {
            level,
            format,
            ..Default::default()
        }
    }
}

/// 로깅 시스템을 초기화합니다.
///
/// `RUST_LOG`가 설정되어 있으면 설정의 레벨보다 우선합니다.
///
/// ```no_run
/// use quote_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(config.with_file)
                    .with_line_number(config.with_file)
                    .with_target(config.with_target)
                    .with_span_events(span_events),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.with_file)
                    .with_line_number(config.with_file)
                    .with_target(config.with_target)
                    .with_span_events(span_events),
            )
            .try_init()?,
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_file(config.with_file)
                    .with_line_number(config.with_file)
                    .with_target(config.with_target)
                    .with_span_events(span_events),
            )
            .try_init()?,
    }

    tracing::info!(format = ?config.format, level = %config.level, "Logging initialized");

    Ok(())
}

/// 조회 상관관계 필드가 포함된 span을 생성하는 매크로.
#[macro_export]
macro_rules! query_span {
    ($name:expr, $correlation_id:expr) => {
        tracing::info_span!($name, correlation_id = %$correlation_id)
    };
    ($name:expr, $correlation_id:expr, $market:expr) => {
        tracing::info_span!($name, correlation_id = %$correlation_id, market = %$market)
    };
}
