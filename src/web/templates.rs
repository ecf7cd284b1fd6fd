use chrono::{Datelike, Utc};

const APP_TITLE: &str = "Watermark Check";

const BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f1f5f9; color: #0f172a; min-height: 100vh; display: flex; flex-direction: column; }
        header { background: #ffffff; padding: 1.75rem clamp(1.5rem, 6vw, 3rem); display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; border-bottom: 1px solid #e2e8f0; }
        header h1 { margin: 0; font-size: clamp(1.6rem, 3vw, 2.1rem); }
        header .who { color: #475569; font-size: 0.95rem; }
        header a.logout { padding: 0.55rem 1.2rem; border-radius: 999px; background: #2563eb; color: #ffffff; font-weight: 600; text-decoration: none; }
        header a.logout:hover { background: #1d4ed8; }
        main { flex: 1; width: 100%; max-width: 720px; margin: 0 auto; padding: clamp(1.5rem, 5vw, 3rem); box-sizing: border-box; display: flex; flex-direction: column; gap: 1.5rem; }
        .panel { background: #ffffff; padding: 2.25rem 2rem; border-radius: 18px; box-shadow: 0 20px 60px rgba(15, 23, 42, 0.08); border: 1px solid #e2e8f0; box-sizing: border-box; }
        .panel h2 { margin-top: 0; }
        p.description { margin: 0 0 1.5rem; color: #475569; font-size: 0.95rem; }
        label { display: block; margin-top: 1.2rem; font-weight: 600; color: #0f172a; }
        input { width: 100%; padding: 0.85rem; margin-top: 0.65rem; border-radius: 10px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; font-size: 1rem; box-sizing: border-box; }
        input:focus { outline: none; border-color: #2563eb; box-shadow: 0 0 0 3px rgba(37, 99, 235, 0.15); }
        button { margin-top: 1.75rem; width: 100%; padding: 0.95rem; border: none; border-radius: 10px; background: #2563eb; color: #ffffff; font-weight: 600; font-size: 1.05rem; cursor: pointer; transition: background 0.15s ease; }
        button:hover { background: #1d4ed8; }
        .switch { margin-top: 1.25rem; text-align: center; font-size: 0.95rem; color: #475569; }
        .switch a { color: #2563eb; font-weight: 600; text-decoration: none; }
        .flash { padding: 1rem 1.25rem; border-radius: 10px; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .verdict { display: inline-flex; padding: 0.4rem 1rem; border-radius: 999px; font-weight: 700; font-size: 1.1rem; }
        .verdict.watermarked { background: #fee2e2; color: #b91c1c; }
        .verdict.clean { background: #dcfce7; color: #166534; }
        .preview { max-width: 100%; border-radius: 12px; border: 1px solid #e2e8f0; margin-top: 1rem; }
        .note { color: #475569; font-size: 0.95rem; }
        .app-footer { margin: 2rem 0 1.5rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
"#;

fn render_document(title: &str, header_html: &str, main_html: &str) -> String {
    let footer = render_footer();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
{header_html}
    <main>
{main_html}
    </main>
    {footer}
</body>
</html>"#,
        title = title,
        styles = BASE_STYLES,
        header_html = header_html,
        main_html = main_html,
        footer = footer,
    )
}

fn signed_in_header(username: &str) -> String {
    format!(
        r#"    <header>
        <h1>{APP_TITLE}</h1>
        <div>
            <span class="who">Signed in as <strong>{username}</strong></span>
            <a class="logout" href="/logout">Log out</a>
        </div>
    </header>"#,
        username = escape_html(username),
    )
}

pub fn render_login_page(flash: Option<&str>) -> String {
    let flash_html = flash
        .map(|message| format!(r#"<div class="flash success">{}</div>"#, escape_html(message)))
        .unwrap_or_default();

    let main_html = format!(
        r#"        {flash_html}
        <section class="panel">
            <h2>Sign in</h2>
            <p class="description">Sign in to check images for watermarks.</p>
            <form method="post" action="/login">
                <label for="username">Username</label>
                <input id="username" name="username" autocomplete="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" autocomplete="current-password" required>
                <button type="submit">Sign in</button>
            </form>
            <p class="switch">No account yet? <a href="/register">Register</a></p>
        </section>"#,
    );

    render_document(&format!("Sign in | {APP_TITLE}"), "", &main_html)
}

pub fn render_register_page() -> String {
    let main_html = r#"        <section class="panel">
            <h2>Create an account</h2>
            <p class="description">Choose a username and password.</p>
            <form method="post" action="/register">
                <label for="username">Username</label>
                <input id="username" name="username" autocomplete="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" autocomplete="new-password" required>
                <button type="submit">Register</button>
            </form>
            <p class="switch">Already registered? <a href="/login">Sign in</a></p>
        </section>"#;

    render_document(&format!("Register | {APP_TITLE}"), "", main_html)
}

pub fn render_home_page(username: &str) -> String {
    let main_html = r#"        <section class="panel">
            <h2>Check an image</h2>
            <p class="description">Upload a PNG, JPEG, BMP, GIF, WebP or TIFF image. It is resized to 112&times;112 and scored by the watermark model.</p>
            <form method="post" action="/upload" enctype="multipart/form-data">
                <label for="file">Image</label>
                <input id="file" type="file" name="file" accept="image/*" required>
                <button type="submit">Analyse</button>
            </form>
        </section>"#;

    render_document(APP_TITLE, &signed_in_header(username), main_html)
}

pub struct ResultView<'a> {
    pub username: &'a str,
    pub filename: &'a str,
    pub preview_url: &'a str,
    pub label: &'a str,
    pub watermarked: bool,
    pub probability: f32,
}

pub fn render_result_page(view: &ResultView<'_>) -> String {
    let verdict_class = if view.watermarked {
        "watermarked"
    } else {
        "clean"
    };

    let main_html = format!(
        r#"        <section class="panel">
            <h2>Result</h2>
            <p class="note">File: <strong>{filename}</strong></p>
            <p><span class="verdict {verdict_class}">{label}</span></p>
            <p class="note">Model score: {probability:.3}</p>
            <img class="preview" src="{preview_url}" alt="{filename}">
            <p class="switch"><a href="/">Check another image</a></p>
        </section>"#,
        filename = escape_html(view.filename),
        verdict_class = verdict_class,
        label = escape_html(view.label),
        probability = view.probability,
        preview_url = escape_html(view.preview_url),
    );

    render_document(
        &format!("Result | {APP_TITLE}"),
        &signed_in_header(view.username),
        &main_html,
    )
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} {APP_TITLE}</footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_covers_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn result_page_escapes_user_supplied_names() {
        let html = render_result_page(&ResultView {
            username: "<script>",
            filename: "a&b.png",
            preview_url: "/uploads/x/a&b.png",
            label: "Watermarked",
            watermarked: true,
            probability: 0.91,
        });
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("a&amp;b.png"));
        assert!(html.contains(r#"class="verdict watermarked">Watermarked<"#));
        assert!(html.contains("0.910"));
    }

    #[test]
    fn login_page_shows_flash() {
        let html = render_login_page(Some("Registration complete."));
        assert!(html.contains("Registration complete."));
        assert!(html.contains(r#"action="/login""#));
        assert!(!render_login_page(None).contains("flash success"));
    }
}
