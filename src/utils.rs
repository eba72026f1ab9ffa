/// Clip a membership grade into [0, 1].
pub fn clamp01(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

/// n equally spaced samples over [ymin, ymax]; a single midpoint when n <= 1.
pub fn linspace(ymin: f64, ymax: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![(ymin + ymax) / 2.0];
    }
    let step = (ymax - ymin) / (n - 1) as f64;
    (0..n).map(|i| ymin + i as f64 * step).collect()
}

/// Format with the given number of significant digits, trimming trailing
/// zeros (the `%g`-style rendering used for crisp prediction output).
pub fn format_sig(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = digits as i32 - 1 - magnitude;
    if decimals <= 0 {
        // integral part alone carries the requested precision
        let scale = 10f64.powi(-decimals);
        return format!("{}", (value / scale).round() * scale);
    }
    let s = format!("{:.*}", decimals as usize, value);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
