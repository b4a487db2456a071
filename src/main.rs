//! 命令行入口 (CLI Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化，并驱动一个 Spider 完成单个请求周期。

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use spider_agent::{ProxySpec, Settings, Spider, SpiderError, Transport};

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "spider.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 执行一次请求周期并输出响应体
    Fetch {
        /// 目标 URL
        url: String,
        /// 符号化动词 (GET / POST / POSTJSON / PUTFILE ...)
        #[arg(short = 'X', long, default_value = "GET")]
        verb: String,
        /// 自定义 HTTP 方法 (如 PATCH)，设置后忽略 --verb
        #[arg(long)]
        method: Option<String>,
        /// 与 --method 配合使用的 Content-Type
        #[arg(long)]
        content_type: Option<String>,
        /// 代理地址 (覆盖配置文件)
        #[arg(short, long)]
        proxy: Option<String>,
        /// 请求头 (KEY=VALUE)
        #[arg(short = 'H', long = "header", value_parser = parse_key_val)]
        headers: Vec<(String, String)>,
        /// 表单字段 (KEY=VALUE)
        #[arg(short, long = "form", value_parser = parse_key_val)]
        form: Vec<(String, String)>,
        /// 二进制请求体，`@path` 表示读取文件
        #[arg(short, long)]
        data: Option<String>,
        /// 发送前等待 (毫秒)
        #[arg(long)]
        wait_ms: Option<u64>,
        /// 请求总超时 (秒)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// 以缩进 JSON 输出响应体
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config)?;

    match cli.command {
        Commands::Fetch {
            url,
            verb,
            method,
            content_type,
            proxy,
            headers,
            form,
            data,
            wait_ms,
            timeout_secs,
            pretty,
        } => {
            if proxy.is_some() {
                settings.proxy = proxy;
            }
            if let Some(secs) = timeout_secs {
                settings.timeout_secs = secs;
            }
            if let Some(ms) = wait_ms {
                settings.wait_ms = ms;
            }

            let spider = build_spider(&settings)?;
            spider.set_url(url).set_wait(settings.wait());
            for (k, v) in &headers {
                spider.add_header(k, v)?;
            }
            for (k, v) in form {
                spider.add_form_param(k, v);
            }
            if let Some(data) = data {
                let bytes = match data.strip_prefix('@') {
                    Some(path) => tokio::fs::read(path).await.map_err(SpiderError::Io)?,
                    None => data.into_bytes(),
                };
                spider.set_binary(bytes);
            }

            let result = match method {
                Some(method) => {
                    spider
                        .send_with(&method, content_type.as_deref().unwrap_or_default())
                        .await
                }
                None => spider.go_by_method(&verb).await,
            };

            if let Err(e) = result {
                if e.is_rejected_early() {
                    error!("请求未发出: {}", e);
                } else {
                    error!("请求失败 (route={}): {}", spider.proxy_address(), e);
                }
                return Err(e.into());
            }

            info!(
                "{} {} via {}",
                spider.status().map_or(0, |s| s.as_u16()),
                spider.previous_url().unwrap_or_default(),
                spider.proxy_address()
            );

            let output = if pretty {
                spider.json_pretty()?
            } else {
                spider.text()
            };
            println!("{}", output);
        }
    }

    Ok(())
}

fn build_spider(settings: &Settings) -> anyhow::Result<Spider> {
    let config = settings.transport_config()?;
    let proxy = settings.proxy.as_deref().map(ProxySpec::parse).transpose()?;
    let transport = Transport::build(proxy.as_ref(), settings.cookies, &config)?;
    if let Some(timeout) = config.timeout {
        info!("请求超时: {:?}", timeout);
    }
    Ok(Spider::with_transport(transport))
}

/// 执行 KEY=VALUE 格式参数解析
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no = found in {}", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
