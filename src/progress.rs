use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

fn make_progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr_with_hz(10));
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar
}

/// One tick per layer of the tile being profiled.
pub fn layer_progress(tile: &str, layers: usize, no_progress: bool) -> ProgressBar {
    if no_progress {
        return ProgressBar::hidden();
    }
    let bar = make_progress_bar(layers as u64);
    bar.set_message(tile.to_string());
    bar
}
