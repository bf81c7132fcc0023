use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Bar resolution; fractions are mapped onto `0..=SCALE`.
const SCALE: u64 = 10_000;

const TEMPLATE: &str = "{msg:>6} [{wide_bar:.cyan/blue}] {percent:>3}% ({elapsed_precise})";

/// One progress bar per downloaded stream, driven by completion fractions.
pub struct StreamProgress {
    bar: ProgressBar,
}

impl StreamProgress {
    pub fn new(label: &str, hidden: bool) -> Self {
        let bar = ProgressBar::new(SCALE);
        if hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_style(
            ProgressStyle::with_template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message(label.to_string());
        Self { bar }
    }

    pub fn set_fraction(&self, fraction: f64) {
        self.bar.set_position(to_position(fraction));
    }

    pub fn finish(&self) {
        self.bar.finish();
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

fn to_position(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * SCALE as f64).round() as u64
}
