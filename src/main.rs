//! Limner server entrypoint.
//!
//! By default this serves MCP over stdio (intended for tool integrations).
//! Use `--http` to serve streamable HTTP at `http://localhost:<port>/mcp`
//! instead, with rendered artifacts under `/static/`.

use std::error::Error;

use limner::config::{Settings, Transport};
use limner::engine::chromium::ChromiumFactory;
use limner::mcp::RenderServer;
use limner::render::mermaid::MermaidRenderer;
use limner::render::plotly::PlotlyRenderer;
use tracing_subscriber::EnvFilter;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--http] [--port <port>]\n\nStdio mode (default) speaks MCP over stdin/stdout.\n--http serves streamable HTTP at `http://localhost:<port>/mcp` and rendered\nfiles at `/static/`. --port overrides the configured port (default 8099).\n\nConfiguration is read from LIMNER_TRANSPORT, LIMNER_PORT, LIMNER_STATIC_DIR,\nLIMNER_ALLOWED_DIRS and LIMNER_SHUTDOWN_GRACE_SECS; flags win over the\nenvironment."
    );
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CliOptions {
    http: bool,
    port: Option<u16>,
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--http" => {
                if options.http {
                    return Err(());
                }
                options.http = true;
            }
            "--port" => {
                if options.port.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let port: u16 = raw.parse().map_err(|_| ())?;
                if port == 0 {
                    return Err(());
                }
                options.port = Some(port);
            }
            _ => return Err(()),
        }
    }

    Ok(options)
}

fn main() {
    let result = (|| -> Result<(), Box<dyn Error>> {
        // Stdout carries the stdio transport, so diagnostics go to stderr.
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();

        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "limner".to_owned());

        let options = match parse_options(args) {
            Ok(options) => options,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        let mut settings = Settings::from_env()?;
        if options.http {
            settings.transport = Transport::Http;
        }
        if let Some(port) = options.port {
            settings.port = port;
        }
        let transport = settings.transport;

        let server = RenderServer::new(
            settings,
            MermaidRenderer::new(Box::new(ChromiumFactory)),
            PlotlyRenderer::new(Box::new(ChromiumFactory)),
        );

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        match transport {
            Transport::Stdio => runtime.block_on(server.serve_stdio())?,
            Transport::Http => runtime.block_on(server.serve_http())?,
        }
        Ok(())
    })();

    if let Err(err) = result {
        eprintln!("limner: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_options, CliOptions};

    fn parse(args: &[&str]) -> Result<CliOptions, ()> {
        parse_options(args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn defaults_to_stdio() {
        assert_eq!(parse(&[]).expect("options"), CliOptions { http: false, port: None });
    }

    #[test]
    fn parses_http_and_port() {
        let options = parse(&["--http", "--port", "9100"]).expect("options");
        assert!(options.http);
        assert_eq!(options.port, Some(9100));
    }

    #[test]
    fn rejects_bad_flags() {
        parse(&["--watch"]).unwrap_err();
        parse(&["--http", "--http"]).unwrap_err();
        parse(&["--port"]).unwrap_err();
        parse(&["--port", "eight"]).unwrap_err();
        parse(&["--port", "0"]).unwrap_err();
    }
}
