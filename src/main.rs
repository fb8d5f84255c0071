fn main() -> anyhow::Result<()> {
    revalidation_reminders_lib::run()
}
