pub mod api;
pub mod core;

pub fn init_logging() {
    // 重复调用无副作用
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
