//! Comandos do shell.

use alloc::string::String;

pub fn cmd_help() {
    crate::kprintln!("Comandos:");
    crate::kprintln!("  help            esta lista");
    crate::kprintln!("  echo <texto>    imprime o texto");
    crate::kprintln!("  clear           limpa a tela");
    crate::kprintln!("  mem             estatisticas de memoria");
    crate::kprintln!("  ls [dir]        lista um diretorio");
    crate::kprintln!("  cat <arquivo>   mostra um arquivo");
    crate::kprintln!("  ver             versao do kernel");
    crate::kprintln!("  uptime          tempo desde o boot");
    crate::kprintln!("  cd <dir>        muda o diretorio corrente");
    crate::kprintln!("  pwd             diretorio corrente");
    crate::kprintln!("  devices         dispositivos e tasks");
    crate::kprintln!("  run <elf>       executa um binario do disco");
}

pub fn cmd_echo(args: &[&str]) {
    let mut first = true;
    for a in args {
        if !first {
            crate::kprint!(" ");
        }
        crate::kprint!("{}", a);
        first = false;
    }
    crate::kprintln!();
}

pub fn cmd_clear() {
    crate::drivers::video::console::clear();
}

pub fn cmd_mem() {
    crate::mm::print_stats();
}

pub fn cmd_ls(args: &[&str]) {
    let path = if args.is_empty() {
        super::cwd()
    } else {
        super::resolve_arg(args[0])
    };

    match crate::fs::vfs::list_path(&path) {
        Ok(entries) => {
            for e in entries {
                // nome em coluna fixa para saída estável no console
                let pad = 16usize.saturating_sub(e.name.len()).max(1);
                crate::kprint!("{}", e.name);
                for _ in 0..pad {
                    crate::kprint!(" ");
                }
                if e.is_dir {
                    crate::kprintln!("[DIR ] {} bytes", e.size);
                } else {
                    crate::kprintln!("[FILE] {} bytes", e.size);
                }
            }
        }
        Err(_) => crate::kprintln!("ls: nao foi possivel listar '{}'", path),
    }
}

pub fn cmd_cat(args: &[&str]) {
    if args.is_empty() {
        crate::kprintln!("uso: cat <arquivo>");
        return;
    }
    let path = super::resolve_arg(args[0]);

    match crate::fs::vfs::read_file_all(&path) {
        Ok(data) => match core::str::from_utf8(&data) {
            Ok(s) => crate::kprint!("{}", s),
            Err(_) => {
                crate::kprintln!("cat: '{}' nao e texto ({} bytes)", path, data.len())
            }
        },
        Err(_) => crate::kprintln!("cat: nao foi possivel ler '{}'", path),
    }
}

pub fn cmd_ver() {
    crate::kprintln!("Cinder OS — kernel Ember v{}", env!("CARGO_PKG_VERSION"));
}

pub fn cmd_uptime() {
    let ms = crate::drivers::timer::uptime_ms();
    let ticks = crate::drivers::timer::ticks();
    crate::kprintln!("uptime: {}.{:03}s ({} ticks)", ms / 1000, ms % 1000, ticks);
}

pub fn cmd_cd(args: &[&str], set_cwd: impl FnOnce(String)) {
    if args.is_empty() {
        set_cwd(String::from("/"));
        return;
    }
    let path = super::resolve_arg(args[0]);
    match crate::fs::vfs::resolve_path(&path) {
        Some((true, _)) => set_cwd(path),
        Some((false, _)) => crate::kprintln!("cd: '{}' nao e um diretorio", path),
        None => crate::kprintln!("cd: '{}' nao existe", path),
    }
}

pub fn cmd_pwd() {
    crate::kprintln!("{}", super::cwd());
}

pub fn cmd_devices() {
    crate::kprintln!("timer : {} ticks", crate::drivers::timer::ticks());
    crate::kprintln!("tasks : {} vivas", crate::sched::scheduler::live_tasks());

    let table = crate::sched::task::TASKS.lock();
    table.for_each_live(|t| {
        crate::kprintln!(
            "  tid={} '{}' {:?}{}",
            t.tid,
            t.name_str(),
            t.state,
            if t.kernel_mode { " [kernel]" } else { "" }
        );
    });
}

pub fn cmd_run(args: &[&str]) {
    if args.is_empty() {
        crate::kprintln!("uso: run <caminho para ELF>");
        return;
    }
    let path = super::resolve_arg(args[0]);

    match crate::sched::elf::elf_run(&path) {
        Ok(tid) => crate::kprintln!("[run] tid={} terminou", tid),
        Err(e) => crate::kprintln!("run: falha ao executar '{}': {:?}", path, e),
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_resolve_arg_absolute_passthrough() {
        // resolve_arg usa o estado global do shell apenas para caminhos
        // relativos; absolutos passam direto
        assert_eq!(crate::shell::resolve_arg("/usr/app.elf"), "/usr/app.elf");
    }
}
