fn main() -> anyhow::Result<()> {
    signalmap_lib::run()
}
