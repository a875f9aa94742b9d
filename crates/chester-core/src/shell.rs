//! Shell command construction for external tools (the downloader).
//!
//! External tools are run through the user's login shell so that PATH
//! tweaks from shell profiles (pipx, Homebrew, ...) apply. Non-POSIX shells
//! fall back to bash or sh.

use std::process::Command;

/// Shells that don't support `-l -c` the POSIX way.
#[cfg(unix)]
const NON_POSIX_SHELLS: [&str; 6] = ["fish", "nu", "nushell", "elvish", "xonsh", "ion"];

/// Build a command that runs `binary` with `args` through a shell.
///
/// The final shape is `<prefix> '<quoted command line>'`, where `prefix`
/// defaults to `$SHELL -l -c`.
#[cfg(unix)]
pub fn build_shell_command(
    binary: &str,
    args: &[String],
    shell_prefix: Option<&str>,
) -> Result<Command, String> {
    let prefix = shell_prefix_or_default(shell_prefix);
    let mut prefix_parts = prefix.split_whitespace();
    let shell_program = prefix_parts
        .next()
        .ok_or_else(|| "Empty shell prefix".to_string())?;

    let command_line = quote_command_line(binary, args)?;

    let mut cmd = Command::new(shell_program);
    cmd.args(prefix_parts).arg(command_line);
    Ok(cmd)
}

/// Windows has no login shell; run the binary directly.
#[cfg(windows)]
pub fn build_shell_command(
    binary: &str,
    args: &[String],
    _shell_prefix: Option<&str>,
) -> Result<Command, String> {
    let mut cmd = Command::new(binary);
    cmd.args(args);
    Ok(cmd)
}

/// Join `binary` and `args` into one shell-safe string.
pub fn quote_command_line(binary: &str, args: &[String]) -> Result<String, String> {
    let mut parts = Vec::with_capacity(args.len() + 1);
    for word in std::iter::once(binary).chain(args.iter().map(String::as_str)) {
        let quoted =
            shlex::try_quote(word).map_err(|_| format!("Cannot quote argument: {word:?}"))?;
        parts.push(quoted.into_owned());
    }
    Ok(parts.join(" "))
}

#[cfg(unix)]
fn shell_prefix_or_default(custom: Option<&str>) -> String {
    if let Some(prefix) = custom.filter(|p| !p.trim().is_empty()) {
        return prefix.to_string();
    }

    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    let shell_name = std::path::Path::new(&shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let effective = if NON_POSIX_SHELLS.contains(&shell_name) {
        if std::path::Path::new("/bin/bash").exists() {
            "/bin/bash".to_string()
        } else {
            "/bin/sh".to_string()
        }
    } else {
        shell
    };

    format!("{effective} -l -c")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_arguments_with_spaces_and_templates() {
        let line = quote_command_line(
            "yt-dlp",
            &[
                "-o".to_string(),
                "my library/%(id)s.%(ext)s".to_string(),
                "https://example.com/watch?v=abc".to_string(),
            ],
        )
        .unwrap();

        let words = shlex::split(&line).unwrap();
        assert_eq!(
            words,
            vec![
                "yt-dlp",
                "-o",
                "my library/%(id)s.%(ext)s",
                "https://example.com/watch?v=abc"
            ]
        );
    }

    #[test]
    fn rejects_nul_bytes() {
        assert!(quote_command_line("yt-dlp", &["a\0b".to_string()]).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn custom_prefix_is_used_verbatim() {
        assert_eq!(shell_prefix_or_default(Some("/bin/zsh -l -c")), "/bin/zsh -l -c");
    }

    #[test]
    #[cfg(unix)]
    fn blank_prefix_falls_back_to_login_shell() {
        assert!(shell_prefix_or_default(Some("  ")).ends_with(" -l -c"));
        assert!(shell_prefix_or_default(None).ends_with(" -l -c"));
    }

    #[test]
    #[cfg(unix)]
    fn command_runs_through_prefix_shell() {
        let cmd = build_shell_command("yt-dlp", &["--version".to_string()], Some("/bin/bash -c"))
            .unwrap();

        assert_eq!(cmd.get_program().to_str().unwrap(), "/bin/bash");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0], "-c");
        assert_eq!(shlex::split(args[1]).unwrap(), vec!["yt-dlp", "--version"]);
    }
}
