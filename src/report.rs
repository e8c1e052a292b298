//! Turning an analysis fragment into a standalone HTML file or a print preview.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use rust_embed::Embed;
use tracing::{info, warn};

#[derive(Embed)]
#[folder = "assets/report/"]
struct ReportAssets;

/// Stylesheet applied to exported and printed reports.
pub fn page_styles() -> String {
    ReportAssets::get("report.css")
        .and_then(|f| std::str::from_utf8(f.data.as_ref()).ok().map(str::to_string))
        .unwrap_or_default()
}

pub fn export_file_name(now_ms: i64) -> String {
    format!("Learning_Analysis_{now_ms}.html")
}

pub fn export_document(fragment: &str, styles: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><style>{styles}</style></head>\
         <body><div class=\"report\">{fragment}</div></body></html>"
    )
}

/// Print-oriented page that opens the print dialog `delay_ms` after load.
pub fn print_document(fragment: &str, styles: &str, title: &str, delay_ms: u64) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>{title}</title>\
         <style>{styles} body {{ background: white !important; padding: 40px; }} \
         @media print {{ @page {{ size: A4; margin: 15mm; }} body {{ padding: 0; }} }}</style>\
         </head><body><div class=\"report\">{fragment}</div>\
         <script>window.onload = () => {{ setTimeout(() => {{ window.print(); }}, {delay_ms}); }};</script>\
         </body></html>"
    )
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("html.tmp");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("cannot create {}", tmp_path.display()))?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Write the downloadable report into `dir` and return its path.
pub fn save_export(dir: &Path, fragment: &str, styles: &str, now_ms: i64) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(now_ms));
    write_atomic(&path, &export_document(fragment, styles))?;
    info!(path = %path.display(), "analysis report exported");
    Ok(path)
}

/// Write the print page to the temp directory and hand it to the system browser.
pub fn open_print_preview(
    fragment: &str,
    styles: &str,
    title: &str,
    delay_ms: u64,
    now_ms: i64,
) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("ai-tutor-print-{now_ms}.html"));
    write_atomic(&path, &print_document(fragment, styles, title, delay_ms))?;
    if let Err(e) = opener_command(&path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        warn!(path = %path.display(), "could not launch browser: {e}");
    }
    Ok(path)
}

fn opener_command(path: &Path) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_name_uses_epoch_millis() {
        assert_eq!(export_file_name(1_700_000_000_123), "Learning_Analysis_1700000000123.html");
    }

    #[test]
    fn export_embeds_styles_and_fragment() {
        let doc = export_document("<h1>报告</h1>", "h1{color:red}");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<meta charset=\"UTF-8\">"));
        assert!(doc.contains("<style>h1{color:red}</style>"));
        assert!(doc.contains("<h1>报告</h1>"));
    }

    #[test]
    fn print_page_schedules_print() {
        let doc = print_document("<p>x</p>", "", "学情分析报告", 500);
        assert!(doc.contains("<title>学情分析报告</title>"));
        assert!(doc.contains("window.print(); }, 500)"));
        assert!(doc.contains("size: A4"));
    }

    #[test]
    fn save_export_writes_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("downloads");
        let path = save_export(&target, "<p>ok</p>", "p{}", 42).unwrap();
        assert_eq!(path.file_name().unwrap(), "Learning_Analysis_42.html");
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("<p>ok</p>"));
        let leftovers: Vec<_> = fs::read_dir(&target)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn bundled_stylesheet_is_present() {
        assert!(page_styles().contains(".report"));
    }
}
