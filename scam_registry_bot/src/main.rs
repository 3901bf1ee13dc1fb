use registry_bot_commons::*;

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "WARNING,scam_registry_bot=debug");
    }
    start_everything(scam_registry_bot::entry());
}
