/// Supported platforms: (os, arch, package suffix).
///
/// Adding a platform means adding a row here and publishing the matching
/// `@<product>/<suffix>` package to the registry.
pub(super) const SUPPORTED: &[(&str, &str, &str)] = &[
    ("windows", "x64", "windows-64"),
    ("windows", "x32", "windows-32"),
    ("linux", "x64", "linux-64"),
    ("linux", "arm64", "linux-arm64"),
    ("linux", "x32", "linux-32"),
    ("macos", "x64", "darwin-64"),
    ("macos", "arm64", "darwin-arm64"),
];

/// Render the supported platforms as an aligned text table for diagnostics.
pub(super) fn render(scope: &str) -> String {
    let header = ("OS", "ARCH", "PACKAGE");
    let rows: Vec<(String, String, String)> = SUPPORTED
        .iter()
        .map(|(os, arch, suffix)| {
            (
                os.to_string(),
                arch.to_string(),
                format!("{}/{}", scope, suffix),
            )
        })
        .collect();

    let os_width = rows
        .iter()
        .map(|r| r.0.len())
        .chain(std::iter::once(header.0.len()))
        .max()
        .unwrap_or_default();
    let arch_width = rows
        .iter()
        .map(|r| r.1.len())
        .chain(std::iter::once(header.1.len()))
        .max()
        .unwrap_or_default();

    let mut out = format!(
        "{:<os_width$}  {:<arch_width$}  {}\n",
        header.0, header.1, header.2
    );
    for (os, arch, package) in rows {
        out.push_str(&format!("{:<os_width$}  {:<arch_width$}  {}\n", os, arch, package));
    }
    out
}
