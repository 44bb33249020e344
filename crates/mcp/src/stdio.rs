//! Newline-delimited JSON-RPC over stdin/stdout.

use std::sync::Arc;

use {
    tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    tracing::{debug, info},
};

use crate::{error::Result, server::McpServer};

/// Serve MCP on the process's stdin/stdout until stdin closes.
///
/// Logs must not go to stdout while this runs.
pub async fn serve_stdio(server: Arc<McpServer>) -> Result<()> {
    info!(tools = server.tool_count(), "MCP server on stdio");
    serve_lines(
        &server,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// One message per line in, one response per line out. Blank lines are
/// skipped and notifications produce no output.
pub async fn serve_lines<R, W>(server: &McpServer, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(response) = server.handle_raw(line).await else {
            continue;
        };
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
    }
    debug!("stdin closed, stopping MCP stdio server");
    Ok(())
}
