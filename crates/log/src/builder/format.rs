//! Format layer creation macros

/// Text layer (`pretty` or `compact`) with the shared display options
macro_rules! fmt_layer {
    ($format:ident, $display:expr, $writer:expr) => {
        tracing_subscriber::fmt::layer()
            .$format()
            .with_writer($writer)
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
    };
}

/// JSON layer; adds the span options
macro_rules! json_layer {
    ($display:expr, $writer:expr) => {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer($writer)
            .with_current_span(true)
            .with_span_list($display.span_list)
            .flatten_event($display.flatten)
            .with_ansi(false)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
    };
}

/// Box the layer, dropping timestamps when disabled
macro_rules! boxed_with_time {
    ($layer:expr, $display:expr) => {
        if $display.time {
            $layer.boxed()
        } else {
            $layer.without_time().boxed()
        }
    };
}
