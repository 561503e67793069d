//! ロック順序の逆転でデッドロックするデモプログラム
//!
//! 8秒経っても終わらなければ SIGABRT でコアダンプを残して終了します。
//! 引数に `nolock` を渡すと逆転が起きず、正常に終了します。

use nix::libc;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::alarm;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// glibc の pthread ミューテックス
///
/// gdb から `pthread_mutex_t` として読めるように、Rust の Mutex ではなく
/// そのまま使います。
struct PthreadMutex(UnsafeCell<libc::pthread_mutex_t>);

// pthread_mutex_t はスレッド間で共有して使うもの
unsafe impl Sync for PthreadMutex {}

impl PthreadMutex {
    const fn new() -> Self {
        Self(UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER))
    }

    fn lock(&self) {
        unsafe {
            libc::pthread_mutex_lock(self.0.get());
        }
    }

    fn unlock(&self) {
        unsafe {
            libc::pthread_mutex_unlock(self.0.get());
        }
    }
}

static GLOBAL_LOCK: PthreadMutex = PthreadMutex::new();
static SPECIAL_LOCK: PthreadMutex = PthreadMutex::new();
static DONE: AtomicUsize = AtomicUsize::new(0);

fn sleep(secs: u64) {
    thread::sleep(Duration::from_secs(secs));
}

/// 少し待ってから global を一瞬だけ取る
#[inline(never)]
fn irrelevant() {
    sleep(2);
    GLOBAL_LOCK.lock();
    GLOBAL_LOCK.unlock();
}

/// global → special の順に取る
#[inline(never)]
fn normal() {
    GLOBAL_LOCK.lock();
    sleep(1);
    SPECIAL_LOCK.lock();
    sleep(1);
    DONE.fetch_add(1, Ordering::SeqCst);
    SPECIAL_LOCK.unlock();
    GLOBAL_LOCK.unlock();
}

/// special → global の順に取る
#[inline(never)]
fn inverted() {
    SPECIAL_LOCK.lock();
    sleep(1);
    GLOBAL_LOCK.lock();
    sleep(1);
    DONE.fetch_add(1, Ordering::SeqCst);
    GLOBAL_LOCK.unlock();
    SPECIAL_LOCK.unlock();
}

/// ロックを取るスレッドが終わるまで待つだけ
#[inline(never)]
fn other() {
    while DONE.load(Ordering::SeqCst) < 2 {
        sleep(1);
    }
}

extern "C" fn alarm_fired(_: libc::c_int) {
    std::process::abort();
}

fn main() -> nix::Result<()> {
    let nolock = std::env::args().nth(1).as_deref() == Some("nolock");

    let mut workers: [fn(); 8] = [
        normal, irrelevant, other, irrelevant, inverted, other, other, irrelevant,
    ];
    if nolock {
        workers[4] = normal;
    }

    unsafe {
        signal(Signal::SIGALRM, SigHandler::Handler(alarm_fired))?;
    }
    alarm::set(8);

    let mut handles = Vec::with_capacity(workers.len());
    for (i, worker) in workers.into_iter().enumerate() {
        println!("Starting {}...", i);
        handles.push(thread::spawn(worker));
    }
    println!("Up and running!");

    for (i, handle) in handles.into_iter().enumerate() {
        println!("Joining {}...", i);
        if handle.join().is_err() {
            std::process::exit(1);
        }
    }
    println!("Joined, all is good!");
    alarm::cancel();
    Ok(())
}
