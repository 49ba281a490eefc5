//! Link lists and Drive pages used by the end-to-end tests

/// A link that already lives on GitHub
pub const KEPT_LINK: &str = "https://github.com/octo/videos/releases/download/video-old/old.mp4";

/// Drive file served directly
pub const DIRECT_ID: &str = "DIRECT01";

/// Drive file behind a scan-warning page
pub const CONFIRM_ID: &str = "CONFIRM02";

/// Drive file that is not shared
pub const PRIVATE_ID: &str = "PRIVATE03";

/// Build a sharing link for a Drive id
pub fn drive_link(id: &str) -> String {
    format!("https://drive.google.com/file/d/{id}/view?usp=sharing")
}

/// Scan-warning page whose form points at `{base}/download`
pub fn scan_warning_page(base: &str, id: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>Google Drive - Virus scan warning</title></head>
<body><p>Google Drive can't scan this file for viruses.</p>
<form id="download-form" action="{base}/download" method="get">
<input type="submit" id="uc-download-link" class="goog-inline-block jfk-button jfk-button-action" value="Download anyway"/>
<input type="hidden" name="id" value="{id}">
<input type="hidden" name="export" value="download">
<input type="hidden" name="confirm" value="t">
<input type="hidden" name="uuid" value="0b6c2c7e">
</form></body></html>"#
    )
}
