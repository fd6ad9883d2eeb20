use anyhow::{Context, Result};
use rmcp::{model::CallToolRequestParam, service::ServiceExt, transport::TokioChildProcess};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

fn locate_context_finder_mcp_bin() -> Result<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_context-finder-mcp") {
        return Ok(PathBuf::from(path));
    }

    // Cargo doesn't always expose CARGO_BIN_EXE_* at runtime. Derive it from the test exe path:
    // `.../target/{debug|release}/deps/<test>` → `.../target/{debug|release}/context-finder-mcp`
    if let Ok(exe) = std::env::current_exe() {
        if let Some(target_profile_dir) = exe.parent().and_then(|p| p.parent()) {
            let candidate = target_profile_dir.join("context-finder-mcp");
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let repo_root = manifest_dir
        .ancestors()
        .nth(2)
        .context("failed to resolve repo root from CARGO_MANIFEST_DIR")?;
    for rel in [
        "target/debug/context-finder-mcp",
        "target/release/context-finder-mcp",
    ] {
        let candidate = repo_root.join(rel);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    anyhow::bail!("failed to locate context-finder-mcp binary")
}

fn tool_text(result: &rmcp::model::CallToolResult) -> Result<Value> {
    let text = result
        .content
        .first()
        .and_then(|c| c.as_text())
        .map(|t| t.text.as_str())
        .context("tool did not return text content")?;
    Ok(serde_json::from_str(text)?)
}

#[tokio::test]
async fn mcp_exposes_eight_tools_and_round_trips_a_project() -> Result<()> {
    let bin = locate_context_finder_mcp_bin()?;

    let home = tempfile::tempdir().context("home tempdir")?;
    let mut cmd = Command::new(bin);
    cmd.env("HOME", home.path());
    cmd.env("RUST_LOG", "warn");

    let transport = TokioChildProcess::new(cmd).context("spawn mcp server")?;
    let service = tokio::time::timeout(Duration::from_secs(10), ().serve(transport))
        .await
        .context("timeout starting MCP server")??;

    let tools = tokio::time::timeout(
        Duration::from_secs(10),
        service.list_tools(Default::default()),
    )
    .await
    .context("timeout listing tools")??;
    let tool_names: HashSet<&str> = tools.tools.iter().map(|t| t.name.as_ref()).collect();
    for expected in [
        "create_index",
        "reindex_project",
        "reindex_file",
        "delete_index",
        "search_code",
        "search_docs",
        "search_by_path",
        "get_index_status",
    ] {
        assert!(
            tool_names.contains(expected),
            "missing tool '{expected}' (available: {tool_names:?})"
        );
    }

    let project = tempfile::tempdir().context("project tempdir")?;
    let root = project.path();
    std::fs::create_dir_all(root.join("src")).context("mkdir src")?;
    std::fs::write(
        root.join("src").join("main.rs"),
        "fn main() { println!(\"hi\"); }\n",
    )
    .context("write main.rs")?;

    let create_args = serde_json::json!({
        "project_path": root.to_string_lossy(),
        "strategy": "lazy",
    });
    let create_result = tokio::time::timeout(
        Duration::from_secs(20),
        service.call_tool(CallToolRequestParam {
            name: "create_index".into(),
            arguments: create_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling create_index")??;
    assert_ne!(
        create_result.is_error,
        Some(true),
        "create_index returned error: {:?}",
        create_result.content
    );
    let status = tool_text(&create_result)?;
    assert_eq!(
        status.get("indexing_state").and_then(Value::as_str),
        Some("complete")
    );

    // A second create_index against the same project must fail: the index
    // already exists.
    let dup_result = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: "create_index".into(),
            arguments: create_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling duplicate create_index")??;
    assert_eq!(
        dup_result.is_error,
        Some(true),
        "duplicate create_index should fail"
    );

    let search_args = serde_json::json!({
        "project_path": root.to_string_lossy(),
        "query": "println hi",
        "top_k": 5,
    });
    let search_result = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: "search_code".into(),
            arguments: search_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling search_code")??;
    assert_ne!(search_result.is_error, Some(true), "search_code returned error");
    let search_json = tool_text(&search_result)?;
    assert!(search_json.get("results").and_then(Value::as_array).is_some());

    let path_args = serde_json::json!({
        "project_path": root.to_string_lossy(),
        "pattern": "**/*.rs",
        "limit": 10,
    });
    let path_result = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: "search_by_path".into(),
            arguments: path_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling search_by_path")??;
    assert_ne!(path_result.is_error, Some(true), "search_by_path returned error");
    let path_json = tool_text(&path_result)?;
    let paths = path_json
        .get("paths")
        .and_then(Value::as_array)
        .context("search_by_path missing paths array")?;
    assert!(paths.iter().any(|p| p.as_str() == Some("src/main.rs")));

    let status_args = serde_json::json!({ "project_path": root.to_string_lossy() });
    let status_result = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: "get_index_status".into(),
            arguments: status_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling get_index_status")??;
    assert_ne!(
        status_result.is_error,
        Some(true),
        "get_index_status returned error"
    );
    let status_json = tool_text(&status_result)?;
    assert_eq!(
        status_json
            .get("stats")
            .and_then(|s| s.get("total_files"))
            .and_then(Value::as_u64),
        Some(1)
    );

    let delete_args = serde_json::json!({ "project_path": root.to_string_lossy() });
    let delete_result = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: "delete_index".into(),
            arguments: delete_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling delete_index")??;
    assert_ne!(delete_result.is_error, Some(true), "delete_index returned error");

    // Once deleted, status should report the index as gone again.
    let status_after_delete = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: "get_index_status".into(),
            arguments: status_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling get_index_status after delete")??;
    assert_eq!(
        status_after_delete.is_error,
        Some(true),
        "get_index_status should fail once index is deleted"
    );

    service.cancel().await.context("shutdown mcp service")?;
    Ok(())
}

#[tokio::test]
async fn mcp_rejects_invalid_search_arguments() -> Result<()> {
    let bin = locate_context_finder_mcp_bin()?;

    let home = tempfile::tempdir().context("home tempdir")?;
    let mut cmd = Command::new(bin);
    cmd.env("HOME", home.path());
    cmd.env("RUST_LOG", "warn");

    let transport = TokioChildProcess::new(cmd).context("spawn mcp server")?;
    let service = tokio::time::timeout(Duration::from_secs(10), ().serve(transport))
        .await
        .context("timeout starting MCP server")??;

    let project = tempfile::tempdir().context("project tempdir")?;
    let root = project.path();
    std::fs::create_dir_all(root.join("src")).context("mkdir src")?;
    std::fs::write(root.join("src").join("lib.rs"), "pub fn lib() {}\n").context("write lib.rs")?;

    let create_args = serde_json::json!({ "project_path": root.to_string_lossy() });
    let create_result = tokio::time::timeout(
        Duration::from_secs(20),
        service.call_tool(CallToolRequestParam {
            name: "create_index".into(),
            arguments: create_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling create_index")??;
    assert_ne!(create_result.is_error, Some(true), "create_index returned error");

    // top_k of 0 is out of range and must be rejected.
    let bad_search_args = serde_json::json!({
        "project_path": root.to_string_lossy(),
        "query": "lib",
        "top_k": 0,
    });
    let bad_search_result = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: "search_code".into(),
            arguments: bad_search_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling search_code with bad top_k")??;
    assert_eq!(
        bad_search_result.is_error,
        Some(true),
        "search_code should reject top_k=0"
    );

    // reindex_file with a path outside the project must be rejected.
    let traversal_args = serde_json::json!({
        "project_path": root.to_string_lossy(),
        "relative_path": "../outside.rs",
    });
    let traversal_result = tokio::time::timeout(
        Duration::from_secs(10),
        service.call_tool(CallToolRequestParam {
            name: "reindex_file".into(),
            arguments: traversal_args.as_object().cloned(),
        }),
    )
    .await
    .context("timeout calling reindex_file with traversal")??;
    assert_eq!(
        traversal_result.is_error,
        Some(true),
        "reindex_file should reject a path that escapes the project root"
    );

    service.cancel().await.context("shutdown mcp service")?;
    Ok(())
}
