//! Teste de integração do VFS.
//!
//! O VFS tem estado global (backend ativo + tabela de handles), então
//! os cenários rodam em sequência dentro de um único teste para não
//! disputarem a montagem com outros threads do harness.

use super::mkfs_fat16;
use crate::fs::block_cache::BlockCache;
use crate::fs::vfs::{self, FdTable};
use crate::sync::Spinlock;
use alloc::sync::Arc;

#[test]
fn test_vfs_end_to_end() {
    // --- montagem ---
    let disk = mkfs_fat16();
    {
        let cache = Arc::new(Spinlock::new(
            BlockCache::new(disk.clone(), 512, 16).unwrap(),
        ));
        let sb = crate::fs::fat16::Fat16Super::mount_with_cache(cache).unwrap();
        crate::fs::fat16::file::write_file(&sb, "/A.TXT", b"conteudo-a").unwrap();
        crate::fs::fat16::file::write_file(&sb, "/B.TXT", b"bbb").unwrap();
        sb.sync().unwrap();
    }

    let cache = Arc::new(Spinlock::new(
        BlockCache::new(disk, 512, 16).unwrap(),
    ));
    vfs::register_builtin_backends();
    assert_eq!(vfs::mount_with_cache(cache).unwrap(), "fat16");

    // --- lazy-load: open + fstat sem leitura de conteúdo ---
    let mut fds_a = FdTable::new();
    let fd = vfs::open_with(&mut fds_a, "/A.TXT", 0, 0);
    assert_eq!(fd, 3, "primeiro fd livre é o 3");

    let (mode, size) = vfs::fstat_with(&fds_a, fd).unwrap();
    assert_eq!(mode, vfs::S_IFREG);
    assert_eq!(size, 10, "fstat já conhece o tamanho");
    assert_eq!(
        vfs::handle_content_loaded(&fds_a, fd),
        Some(false),
        "open/fstat não podem ter lido o conteúdo"
    );

    // --- isolamento de fds entre tasks ---
    let mut fds_b = FdTable::new();
    let fd_b = vfs::open_with(&mut fds_b, "/B.TXT", 0, 0);
    assert_eq!(fd_b, 3, "task B também recebe fd 3");

    let mut buf = [0u8; 32];
    let n = vfs::read_with(&mut fds_a, 3, &mut buf);
    assert_eq!(&buf[..n as usize], b"conteudo-a");

    let n = vfs::read_with(&mut fds_b, 3, &mut buf);
    assert_eq!(&buf[..n as usize], b"bbb", "fd 3 de B é outro arquivo");

    // leitura além do fim retorna 0 (EOF), não erro
    assert_eq!(vfs::read_with(&mut fds_a, 3, &mut buf), 0);

    // --- lseek só mexe no offset ---
    assert_eq!(vfs::lseek_with(&mut fds_a, 3, 0, 0), 0);
    let n = vfs::read_with(&mut fds_a, 3, &mut buf[..4]);
    assert_eq!(&buf[..n as usize], b"cont");
    assert_eq!(vfs::lseek_with(&mut fds_a, 3, -2, 1), 2); // SEEK_CUR
    assert_eq!(vfs::lseek_with(&mut fds_a, 3, 0, 2), 10); // SEEK_END

    // --- escrita: overwrite truncante via backend ---
    let written = vfs::write_with(&mut fds_a, 3, b"novo");
    assert_eq!(written, 4);
    assert_eq!(vfs::lseek_with(&mut fds_a, 3, 0, 2), 4, "tamanho virou 4");

    let all = vfs::read_file_all("/A.TXT").unwrap();
    assert_eq!(all, b"novo");

    // --- fstat de tty e isatty ---
    let (mode, _) = vfs::fstat_with(&fds_a, 0).unwrap();
    assert_eq!(mode, vfs::S_IFCHR);
    assert!(vfs::isatty(0) && vfs::isatty(1) && vfs::isatty(2));
    assert!(!vfs::isatty(3));

    // --- listagem e resolução ---
    let entries = vfs::list_path("/").unwrap();
    assert!(entries.iter().any(|e| e.name == "A.TXT"));
    assert!(entries.iter().any(|e| e.name == "B.TXT"));

    let (is_dir, _) = vfs::resolve_path("/").unwrap();
    assert!(is_dir);
    let (is_dir, size) = vfs::resolve_path("/B.TXT").unwrap();
    assert!(!is_dir);
    assert_eq!(size, 3);
    assert!(vfs::resolve_path("/NADA").is_none());

    // --- close libera handle global e slot local ---
    let live_before = vfs::open_handle_count();
    assert_eq!(vfs::close_with(&mut fds_a, 3), 0);
    assert_eq!(vfs::close_with(&mut fds_a, 3), -1, "fechar duas vezes falha");
    assert_eq!(vfs::open_handle_count(), live_before - 1);

    // release_all limpa o resto
    fds_b.release_all();
    assert_eq!(vfs::open_handle_count(), live_before - 2);

    // fds fora da faixa
    assert_eq!(vfs::close_with(&mut fds_a, 0), -1);
    assert_eq!(vfs::close_with(&mut fds_a, 32), -1);
    assert_eq!(vfs::read_with(&mut fds_a, 31, &mut buf), -1);

    vfs::unmount();
}
