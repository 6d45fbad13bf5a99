
#[derive(Default)]
pub struct LoggingConfig {
    verbose: bool,
    output_to_file: bool,
}

impl LoggingConfig {
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn output_to_file(mut self, output_to_file: bool) -> Self {
        self.output_to_file = output_to_file;
        self
    }

    pub fn apply(self) {
        use fern::colors::{Color, ColoredLevelConfig};
        use log::LevelFilter;

        let colors = ColoredLevelConfig::new()
            .error(Color::Red)
            .warn(Color::Yellow)
            .info(Color::Green)
            .debug(Color::BrightMagenta)
            .trace(Color::BrightBlack);

        let level = if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };

        let stderr_config = fern::Dispatch::new()
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "{date} {level} [{target}] {message}",
                    date = chrono::Local::now().format("[%Y/%m/%d %H:%M:%S]"),
                    level = colors.color(record.level()),
                    target = record.target(),
                ));
            })
            .chain(std::io::stderr());

        let mut config = fern::Dispatch::new().level(level).chain(stderr_config);

        if self.output_to_file {
            let log_file = fern::log_file("aplpat.log").expect("failed to open aplpat.log");
            let file_config = fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{date} {level} [{target}] {message}",
                        date = chrono::Local::now().format("[%Y/%m/%d %H:%M:%S]"),
                        level = record.level(),
                        target = record.target(),
                    ));
                })
                .chain(log_file);
            config = config.chain(file_config);
        }

        config.apply().expect("logger already initialized");
    }
}
