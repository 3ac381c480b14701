//! spiduplex - full-duplex SPI master/slave stress test

fn main() -> anyhow::Result<()> {
    spiduplex_cli::run()
}
