use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use sapopinguino_lib::client::{languages, HttpTransport, StreamSessionManager};
use sapopinguino_lib::config::{self, Config, TransformationMode};
use sapopinguino_lib::providers::OpenAIResponsesProvider;
use sapopinguino_lib::server::{self, AppState};
use sapopinguino_lib::telemetry;

#[derive(Debug, Parser)]
#[command(name = "sapopinguino", version, about = "流式翻译代理与客户端")]
struct Cli {
    /// 配置文件路径（默认 ~/.sapopinguino/config.yaml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 启动流式翻译代理
    Serve,

    /// 写出默认配置文件
    Init {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 向代理发送一次翻译并打印结果
    Translate {
        /// 待翻译文本
        text: String,

        /// 源语言（名称）
        #[arg(long)]
        source: Option<String>,

        /// 目标语言（名称）
        #[arg(long)]
        target: Option<String>,

        /// 转换模式
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// 覆盖配置中的服务端地址
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Respell,
    Translate,
}

impl From<ModeArg> for TransformationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Respell => TransformationMode::Respell,
            ModeArg::Translate => TransformationMode::Translate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli
        .config
        .map(config::expand_tilde)
        .unwrap_or_else(config::default_config_path);
    // init 不读取现有配置，也不写入环境变量中的密钥
    if let Command::Init { force } = cli.command {
        return init(&path, force);
    }

    let config = config::load_config(&path)
        .with_context(|| format!("加载配置失败: {}", path.display()))?;

    telemetry::init_tracing(&config.logging);

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Serve => serve(config).await,
        Command::Translate {
            text,
            source,
            target,
            mode,
            endpoint,
        } => translate(config, text, source, target, mode, endpoint).await,
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
    }
    config::save_config(path, &Config::default())
        .with_context(|| format!("写入配置失败: {}", path.display()))?;
    println!("已写入默认配置: {}", path.display());
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let provider = OpenAIResponsesProvider::new(config.provider.clone())
        .context("创建上游 Provider 失败")?;
    let state = AppState::new(Arc::new(provider), config);

    server::run_server(state, server::shutdown_signal())
        .await
        .context("服务器异常退出")
}

async fn translate(
    config: Config,
    text: String,
    source: Option<String>,
    target: Option<String>,
    mode: Option<ModeArg>,
    endpoint: Option<String>,
) -> Result<()> {
    let mut client_config = config.client;
    if let Some(endpoint) = endpoint {
        client_config.endpoint = endpoint;
    }
    if let Some(mode) = mode {
        client_config.mode = mode.into();
    }
    if let Some(source) = source {
        if languages::source_index(&source).is_none() {
            bail!("未知的源语言: {}", source);
        }
        client_config.source_language = source;
    }
    if let Some(target) = target {
        if languages::target_index(&target).is_none() {
            bail!("未知的目标语言: {}", target);
        }
        client_config.target_language = target;
    }
    if !client_config.accepts_input(&text) {
        bail!("输入超过 {} 个字符", client_config.input_limit);
    }

    let transport = HttpTransport::new(client_config.clone()).context("创建 HTTP 客户端失败")?;
    let manager = StreamSessionManager::new(Arc::new(transport), &client_config);

    manager.send(text);
    let snapshot = manager.wait_idle().await;

    for (index, token) in snapshot.indexed_tokens() {
        tracing::debug!(index, kind = token.kind(), "[SESSION] token");
    }
    println!("{}", snapshot.rendered_text());

    if snapshot.has_error {
        bail!("翻译以错误结束");
    }
    Ok(())
}
