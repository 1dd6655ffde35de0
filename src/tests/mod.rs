mod import_e2e;
