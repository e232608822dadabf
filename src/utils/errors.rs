//! User-Friendly Error Formatting
//!
//! Renders fatal startup errors with troubleshooting hints for the usual
//! ways a clipboard daemon fails to come up.

use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Match on the whole chain so context layers don't hide the cause
    let error_msg = format!("{:#}", error);

    if error_msg.contains("already in use") {
        format_socket_in_use_error(&mut output);
    } else if error_msg.contains("XDG_RUNTIME_DIR") {
        format_runtime_dir_error(&mut output);
    } else if error_msg.contains("data-control")
        || error_msg.contains("MissingProtocol")
        || error_msg.contains("compositor")
        || error_msg.contains("Wayland")
    {
        format_wayland_error(&mut output);
    } else if error_msg.contains("bind socket") || error_msg.contains("permissions on socket") {
        format_socket_error(&mut output);
    } else if error_msg.contains("config") {
        format_config_error(&mut output);
    } else {
        format_generic_error(&mut output, &error.to_string());
    }

    writeln!(&mut output).ok();
    writeln!(&mut output, "{}", RULE).ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    writeln!(&mut output, "{}", RULE).ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: lamco-clipd -vv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Report issues: https://github.com/lamco-admin/lamco-clip-history/issues"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_socket_in_use_error(output: &mut String) {
    writeln!(output, "Daemon Already Running").ok();
    writeln!(output).ok();
    writeln!(output, "Another lamco-clipd is serving this socket.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. The daemon was started twice").ok();
    writeln!(output, "     → Check: pgrep -a lamco-clipd").ok();
    writeln!(output, "     → Stop the old one or use it").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Two daemons should run side by side").ok();
    writeln!(output, "     → Give the second one its own --socket path").ok();
}

fn format_runtime_dir_error(output: &mut String) {
    writeln!(output, "No Runtime Directory").ok();
    writeln!(output).ok();
    writeln!(
        output,
        "XDG_RUNTIME_DIR is unset, so there is no default socket location."
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "Fixes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Start the daemon from your desktop session").ok();
    writeln!(output, "     → Check: echo $XDG_RUNTIME_DIR").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Choose a socket path explicitly").ok();
    writeln!(output, "     → lamco-clipd --socket /path/to/lamco-clip.sock").ok();
    writeln!(output, "     → or set LAMCO_CLIP_SOCKET").ok();
}

fn format_wayland_error(output: &mut String) {
    writeln!(output, "Clipboard Access Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not access the Wayland clipboard.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Not running in a Wayland session").ok();
    writeln!(
        output,
        "     → Check: echo $WAYLAND_DISPLAY (should not be empty)"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Compositor lacks the data-control protocol").ok();
    writeln!(
        output,
        "     → Supported: Sway, Hyprland, KDE Plasma 6, other wlroots compositors"
    )
    .ok();
    writeln!(output, "     → GNOME/Mutter does not expose data-control").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Run headless for testing").ok();
    writeln!(output, "     → Set [capture] backend = \"memory\"").ok();
}

fn format_socket_error(output: &mut String) {
    writeln!(output, "Socket Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not create the daemon socket.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Directory is not writable").ok();
    writeln!(output, "     → Check permissions of the socket's parent directory").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Path is too long for a Unix socket (108 bytes)").ok();
    writeln!(output, "     → Use a shorter --socket path").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "The configuration file could not be used.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Out-of-range values").ok();
    writeln!(output, "     → history.capacity must be at least 1").ok();
    writeln!(
        output,
        "     → history.max_entry_size must not exceed history.max_total_bytes"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  3. Unknown names").ok();
    writeln!(output, "     → capture.backend: wayland | memory").ok();
    writeln!(output, "     → logging.format: pretty | compact | json").ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Daemon Error").ok();
    writeln!(output).ok();
    writeln!(output, "An error occurred while running the daemon.").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
}
